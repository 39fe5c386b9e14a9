//! This module defines the [`SimOpts`] configuration which describes how a transfer is
//! simulated.

use crate::actors::DEFAULT_INITIAL_DELAY;
use crate::units::Nanosecs;

/// Simulation options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct SimOpts {
    /// Idle time before the sender starts.
    #[builder(default = DEFAULT_INITIAL_DELAY)]
    pub initial_delay: Nanosecs,
    /// Computation charged per byte prepared, copied, or processed.
    #[builder(default = 1.0)]
    pub flops_per_byte: f64,
    /// Simulated time after which the run is abandoned.
    #[builder(default)]
    pub deadline: Option<Nanosecs>,
    /// Name of the channel the actors meet on.
    #[builder(default = String::from("message"), setter(into))]
    pub channel: String,
}

impl Default for SimOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}
