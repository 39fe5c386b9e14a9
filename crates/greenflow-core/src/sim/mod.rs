//! The discrete-event substrate transfers run on: cooperative actors, rendezvous channels,
//! fluid bandwidth sharing, and energy metering.

mod comm;
mod engine;
mod fluid;
mod meter;

pub use comm::{ActivitySet, Channel, Comm, Payload};
pub use engine::{Context, Engine, Handle, Settled, SimError, Unmatched};
