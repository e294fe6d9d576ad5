//! NPU driver instance
//!
//! A [`Driver`] owns one [`Device`] plus everything needed to run payloads
//! on it: the completion semaphore signalled by the interrupt handler, the
//! abort / fault flags, clock and power arbitration, and the integrator's
//! [`Platform`].
//!
//! The device sits behind a mutex shared with [`Driver::irq_handler`]. A
//! caller waiting for completion never holds it, so the handler can always
//! make progress.
//!
//! The dispatch, interrupt and PMU entry points live in their own modules
//! (`dispatch`, `irq`, `pmu`) as further `impl Driver` blocks.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::DriverConfig;
use crate::device::{Device, NpuConfig, NpuId};
use crate::error::Result;
use crate::mmio::RegisterIo;
use crate::platform::{HostedPlatform, Platform, Semaphore};
use crate::power::{ClockPowerArbiter, Client, Request};

/// Driver major version
pub const DRIVER_VERSION_MAJOR: u32 = 0;
/// Driver minor version
pub const DRIVER_VERSION_MINOR: u32 = 16;
/// Driver patch version
pub const DRIVER_VERSION_PATCH: u32 = 0;

static NEXT_DRIVER_ID: AtomicUsize = AtomicUsize::new(0);

/// Driver version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverVersion {
    /// Major
    pub major: u32,
    /// Minor
    pub minor: u32,
    /// Patch
    pub patch: u32,
}

/// Hardware and driver identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Decoded `ID` register
    pub id: NpuId,
    /// Decoded `CONFIG` register
    pub config: NpuConfig,
    /// This driver
    pub driver: DriverVersion,
}

/// Progress of the most recent command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// No command stream in flight
    Idle = 0,
    /// Run command issued, waiting for the interrupt
    Running = 1,
    /// Interrupt received without error
    Completed = 2,
    /// Wait ended by [`Driver::abort`]
    Aborted = 3,
    /// Interrupt reported an error status
    Faulted = 4,
}

impl RunState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Aborted,
            4 => Self::Faulted,
            _ => Self::Idle,
        }
    }
}

/// Everything guarded by the device mutex.
#[derive(Debug)]
pub(crate) struct DriverCore {
    pub(crate) dev: Device,
    pub(crate) arbiter: ClockPowerArbiter,
    pub(crate) config: DriverConfig,
}

impl DriverCore {
    /// Update `client`'s clock / power holds and program the result.
    pub(crate) fn request_power(&mut self, client: Client, clock: Request, power: Request) {
        let gating = self.arbiter.request(client, clock, power);
        tracing::debug!(?client, ?clock, ?power, ?gating, "Clock/power request");
        self.dev.set_clock_and_power(gating.clock, gating.power);
    }

    /// Apply the configured queue, region and AXI limit setup.
    pub(crate) fn axi_init(&self) -> Result<()> {
        let axi = &self.config.axi;
        self.dev.set_qconfig(axi.qconfig);
        for (region, &memory_type) in axi.regions.iter().enumerate() {
            self.dev.set_regioncfg(region, memory_type)?;
        }
        for (index, limit) in axi.limits.iter().enumerate() {
            self.dev.set_axi_limit(index, limit)?;
        }
        Ok(())
    }

    /// Reset, then bring clocks, AXI and PMU configuration back.
    pub(crate) fn soft_reset_and_restore(&mut self) -> Result<()> {
        self.dev.soft_reset()?;
        self.request_power(Client::Inference, Request::Release, Request::Hold);
        self.axi_init()?;
        self.dev.restore_pmu_config();
        Ok(())
    }
}

/// Ethos-U driver
pub struct Driver {
    id: usize,
    core: Mutex<DriverCore>,
    /// Serializes payloads; never taken by the interrupt handler
    dispatch: Mutex<()>,
    pub(crate) reserved: AtomicBool,
    pub(crate) abort_inference: AtomicBool,
    pub(crate) irq_triggered: AtomicBool,
    pub(crate) status_error: AtomicBool,
    pub(crate) fault_status: AtomicU32,
    run_state: AtomicU8,
    pub(crate) semaphore: Box<dyn Semaphore>,
    pub(crate) platform: Arc<dyn Platform>,
}

impl Driver {
    /// Initialize the NPU behind `io`.
    ///
    /// Holds clock and power for inference, soft-resets the NPU into the
    /// configured security state and, with `power_always_on`, applies the
    /// AXI setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset times out or the NPU refuses the
    /// requested security state.
    pub fn init(
        io: Box<dyn RegisterIo>,
        config: DriverConfig,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        let id = NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            driver = id,
            secure = config.security.secure,
            privileged = config.security.privileged,
            fast_memory = ?config.fast_memory,
            "Initializing Ethos-U driver"
        );

        let dev = Device::new(io, config.security, config.reset, Arc::clone(&platform));
        let mut core = DriverCore {
            dev,
            arbiter: ClockPowerArbiter::new(),
            config,
        };
        core.request_power(Client::Inference, Request::Hold, Request::Hold);
        core.dev.soft_reset()?;
        core.dev.wait_for_reset()?;
        if core.config.power_always_on {
            core.axi_init()?;
        }

        Ok(Self {
            id,
            core: Mutex::new(core),
            dispatch: Mutex::new(()),
            reserved: AtomicBool::new(false),
            abort_inference: AtomicBool::new(false),
            irq_triggered: AtomicBool::new(false),
            status_error: AtomicBool::new(false),
            fault_status: AtomicU32::new(0),
            run_state: AtomicU8::new(RunState::Idle as u8),
            semaphore: platform.create_semaphore(),
            platform,
        })
    }

    /// [`init`](Self::init) with [`HostedPlatform`].
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    pub fn init_hosted(io: Box<dyn RegisterIo>, config: DriverConfig) -> Result<Self> {
        Self::init(io, config, Arc::new(HostedPlatform))
    }

    /// Process-unique driver id, used in logs.
    pub const fn id(&self) -> usize {
        self.id
    }

    /// True while reserved from a pool.
    pub fn is_reserved(&self) -> bool {
        self.reserved.load(Ordering::Acquire)
    }

    /// Progress of the current or most recent command stream.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_run_state(&self, state: RunState) {
        self.run_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn lock_core(&self) -> MutexGuard<'_, DriverCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the device.
    ///
    /// Do not call while an inference on this driver is waiting for its
    /// interrupt from the same thread.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut Device) -> R) -> R {
        f(&mut self.lock_core().dev)
    }

    /// Hardware and driver version.
    pub fn version(&self) -> Version {
        let core = self.lock_core();
        Version {
            id: core.dev.id(),
            config: core.dev.config(),
            driver: DriverVersion {
                major: DRIVER_VERSION_MAJOR,
                minor: DRIVER_VERSION_MINOR,
                patch: DRIVER_VERSION_PATCH,
            },
        }
    }

    /// Keep the NPU powered between inferences.
    ///
    /// Enabling reapplies the AXI setup immediately; while disabled it is
    /// applied before every command stream. Waits for a payload in flight
    /// to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured AXI setup is rejected.
    pub fn set_power_mode(&self, always_on: bool) -> Result<()> {
        let _dispatch = self.lock_dispatch();
        let mut core = self.lock_core();
        core.config.power_always_on = always_on;
        tracing::info!(driver = self.id, always_on, "Power mode");
        if always_on {
            core.axi_init()?;
        }
        Ok(())
    }

    /// True if the NPU is kept powered between inferences.
    pub fn power_always_on(&self) -> bool {
        self.lock_core().config.power_always_on
    }

    /// Driver configuration.
    pub fn config(&self) -> DriverConfig {
        self.lock_core().config.clone()
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("id", &self.id)
            .field("reserved", &self.is_reserved())
            .field("run_state", &self.run_state())
            .finish_non_exhaustive()
    }
}
