use crate::units::{BitsPerSec, Flops, Nanosecs, Watts};

/// A host or router in the platform.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub kind: HostKind,
    /// Per-core compute speed.
    pub speed: Flops,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default)]
    pub power: HostPower,
}

fn default_cores() -> u32 {
    1
}

impl Host {
    pub fn new_host(name: impl Into<String>, speed: Flops, power: HostPower) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Host,
            speed,
            cores: 1,
            power,
        }
    }

    pub fn new_router(name: impl Into<String>, speed: Flops, power: HostPower) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Router,
            speed,
            cores: 1,
            power,
        }
    }

    /// Instantaneous power draw with `busy` cores executing.
    pub fn power_draw(&self, busy: u32) -> Watts {
        let load = busy.min(self.cores) as f64 / self.cores as f64;
        let HostPower { idle, max } = self.power;
        Watts::new(idle.into_f64() + (max.into_f64() - idle.into_f64()) * load)
    }
}

/// Routers forward traffic; hosts only originate and terminate it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HostKind {
    #[default]
    Host,
    Router,
}

/// Linear host power model: `idle` with no busy core, `max` with every core busy.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HostPower {
    pub idle: Watts,
    pub max: Watts,
}

identifier!(HostId, usize);

identifier!(LinkId, usize);

/// A bidirectional link. Both directions share its bandwidth.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub name: String,
    pub a: String,
    pub b: String,
    pub bandwidth: BitsPerSec,
    pub latency: Nanosecs,
    #[serde(default)]
    pub power: LinkPower,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        a: impl Into<String>,
        b: impl Into<String>,
        bandwidth: impl Into<BitsPerSec>,
        latency: impl Into<Nanosecs>,
    ) -> Self {
        Self {
            name: name.into(),
            a: a.into(),
            b: b.into(),
            bandwidth: bandwidth.into(),
            latency: latency.into(),
            power: LinkPower::default(),
        }
    }

    pub fn with_power(mut self, power: LinkPower) -> Self {
        self.power = power;
        self
    }

    pub fn connects(&self, x: &str, y: &str) -> bool {
        self.a == x && self.b == y || self.a == y && self.b == x
    }

    /// Instantaneous power draw while carrying `used` bits per second.
    pub fn power_draw(&self, used: f64) -> Watts {
        let utilization = (used / self.bandwidth.into_f64()).clamp(0.0, 1.0);
        let LinkPower { idle, busy } = self.power;
        Watts::new(idle.into_f64() + (busy.into_f64() - idle.into_f64()) * utilization)
    }
}

/// Linear link power model: `idle` when unused, `busy` at full utilization.
#[derive(Debug, Default, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinkPower {
    pub idle: Watts,
    pub busy: Watts,
}
