//! Pure Rust driver for Arm Ethos-U microNPUs.
//!
//! The driver takes a compiled network payload (a "COP1" driver-action
//! stream produced by the model optimizer), programs the NPU register
//! window, and waits for the completion interrupt. It also exposes the
//! performance monitoring unit and a pool for systems with several NPUs.
//!
//! # Layers
//!
//! ```text
//! DriverPool        reserve / release across NPUs
//!   Driver          invoke, abort, irq_handler, PMU, power mode
//!     dispatch      payload records ─► command streams
//!     power         clock / power hold arbitration
//!     Device        register-level operations, reset, PMU shadow
//!       RegisterIo  MappedRegion (hardware) | SimulatedNpu (software)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use ethosu_driver::{BaseRegion, DriverConfig, MappedRegion, Driver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let io = MappedRegion::map_physical("/dev/uio0", 0, 0x1000)?;
//! let drv = std::sync::Arc::new(Driver::init_hosted(Box::new(io), DriverConfig::default())?);
//! // route the NPU interrupt to drv.irq_handler()
//!
//! let payload = std::fs::read("network.cop1")?;
//! drv.invoke(&payload, &[BaseRegion::new(0x6000_0000, 0x10_0000)])?;
//! # Ok(())
//! # }
//! ```
//!
//! Without hardware, [`SimulatedNpu`] stands in for the register window.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod config;
mod device;
pub mod diagnostics;
mod dispatch;
mod driver;
mod error;
mod irq;
pub mod mmio;
pub mod payload;
pub mod platform;
mod pmu;
mod pool;
mod power;
pub mod sim;

pub use config::{
    AddressAlias, AxiConfig, AxiLimit, DriverConfig, FastMemory, ResetPolicy, Security,
};
pub use device::{Device, DeviceState, NpuConfig, NpuId, PmuShadow};
pub use dispatch::BaseRegion;
pub use driver::{
    Driver, DriverVersion, RunState, Version, DRIVER_VERSION_MAJOR, DRIVER_VERSION_MINOR,
    DRIVER_VERSION_PATCH,
};
pub use error::{EthosuError, Result};
pub use irq::WaitOutcome;
pub use mmio::{MappedRegion, RegisterIo};
pub use payload::{Payload, PayloadBuilder, PayloadReader};
pub use platform::{BareMetalPlatform, CacheRegion, HostedPlatform, Platform, Semaphore};
pub use pmu::Pmu;
pub use pool::DriverPool;
pub use power::{Client, ClockPowerArbiter, Gating, Request};
pub use sim::{SimConfig, SimulatedNpu};

pub use ethosu_chip::memory::{AxiBeats, AxiMemType, MemoryType};
pub use ethosu_chip::pmu::{counter_mask, PmuEvent, CCNT_MASK, NCOUNTERS};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        BaseRegion, Driver, DriverConfig, DriverPool, EthosuError, PayloadBuilder, PmuEvent,
        Result, SimConfig, SimulatedNpu,
    };
}
