//! Clock and power arbitration between driver clients.
//!
//! Both the inference path and the PMU may need the NPU clocked and
//! powered. Each client holds one bit per resource; the hardware is only
//! allowed to gate a resource when no client holds it.

/// A party that can hold the NPU clock or power on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Client {
    /// Inference dispatch
    Inference = 0,
    /// Performance monitoring
    Pmu = 1,
}

impl Client {
    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// What a client wants for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Keep the resource on (gating disabled)
    Hold,
    /// No longer needs the resource
    Release,
}

/// Gating permissions to program into `CMD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gating {
    /// Hardware may gate the clock
    pub clock: bool,
    /// Hardware may gate power
    pub power: bool,
}

/// Per-resource client bitmasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockPowerArbiter {
    clock: u32,
    power: u32,
}

impl ClockPowerArbiter {
    /// No client holds anything.
    pub const fn new() -> Self {
        Self { clock: 0, power: 0 }
    }

    /// Record `client`'s requests and return the resulting gating.
    pub fn request(&mut self, client: Client, clock: Request, power: Request) -> Gating {
        apply(&mut self.clock, client, clock);
        apply(&mut self.power, client, power);
        self.gating()
    }

    /// Gating permitted by the current holders.
    pub const fn gating(&self) -> Gating {
        Gating {
            clock: self.clock == 0,
            power: self.power == 0,
        }
    }

    /// True if `client` holds the clock.
    pub const fn holds_clock(&self, client: Client) -> bool {
        self.clock & client.bit() != 0
    }

    /// True if `client` holds power.
    pub const fn holds_power(&self, client: Client) -> bool {
        self.power & client.bit() != 0
    }
}

fn apply(mask: &mut u32, client: Client, request: Request) {
    match request {
        Request::Hold => *mask |= client.bit(),
        Request::Release => *mask &= !client.bit(),
    }
}
