#![warn(unreachable_pub, missing_debug_implementations)]

//! The core greenflow library. This crate defines [the routine](run::run) that simulates
//! a job split into concurrent flows crossing a platform, and reports the energy it cost.

#[macro_use]
mod ident;

pub mod actors;
pub mod energy;
pub mod job;
pub mod opts;
pub mod platform;
pub mod report;
pub mod route;
pub mod run;
pub mod sim;
#[cfg(test)]
pub(crate) mod testing;
pub mod units;

pub use energy::{EnergyProbe, EnergySummary};
pub use job::{split, Flow, JobDescriptor, JobError, PayloadSize};
pub use opts::SimOpts;
pub use platform::{Host, HostKind, HostPower, Link, LinkPower, Platform, PlatformError};
pub use report::EnergyReport;
pub use route::{RouteKey, RouteKeyError, RouteKeyFormat};
pub use run::{run, Error, Transfer};
