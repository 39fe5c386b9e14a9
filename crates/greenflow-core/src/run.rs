use std::sync::Arc;

use crate::actors::{Receiver, Sender};
use crate::energy::EnergySummary;
use crate::job::JobDescriptor;
use crate::opts::SimOpts;
use crate::platform::{HostId, HostKind, Platform};
use crate::report::EnergyReport;
use crate::route::{RouteKey, RouteKeyError};
use crate::sim::{Engine, SimError, Unmatched};
use crate::units::Bytes;

/// A transfer request: move `job` from the route's source to its destination.
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct Transfer {
    pub platform: Arc<Platform>,
    pub route: RouteKey,
    pub job: JobDescriptor,
    #[builder(default)]
    pub opts: SimOpts,
}

impl Transfer {
    /// Resolves the route's endpoints.
    ///
    /// Correctness properties:
    ///
    /// - Both endpoints must be end hosts of the platform
    /// - The destination must be reachable from the source
    fn endpoints(&self) -> Result<(HostId, HostId), Error> {
        let endpoint = |name: &str| -> Result<HostId, Error> {
            let id = self
                .platform
                .host_id(name)
                .ok_or_else(|| Error::UnknownHost(name.to_owned()))?;
            // CORRECTNESS: actors only run on end hosts.
            match self.platform.host(id).kind {
                HostKind::Host => Ok(id),
                HostKind::Router => Err(Error::NotAHost(name.to_owned())),
            }
        };
        let src = endpoint(self.route.source())?;
        let dst = endpoint(self.route.destination())?;
        // CORRECTNESS: flows must have a path to travel.
        if self.platform.route(src, dst).is_none() {
            return Err(Error::NoRoute {
                src: self.route.source().to_owned(),
                dst: self.route.destination().to_owned(),
            });
        }
        Ok((src, dst))
    }
}

/// Simulates a transfer and reports its duration and energy.
///
/// The sender runs on the route's source and the receiver on its destination. Both derive
/// their flow count from the same job, so they always agree. This function returns an error
/// before anything is scheduled if the route does not fit the platform.
pub fn run(transfer: Transfer) -> Result<EnergyReport, Error> {
    let (src, dst) = transfer.endpoints()?;
    let Transfer {
        platform,
        route,
        job,
        opts,
    } = transfer;

    let mut engine = Engine::new(platform).with_deadline(opts.deadline);
    let channel = engine.channel(&opts.channel);
    let sender = Sender::builder()
        .job(job.clone())
        .channel(channel.clone())
        .initial_delay(opts.initial_delay)
        .flops_per_byte(opts.flops_per_byte)
        .build();
    let receiver = Receiver::builder()
        .flow_count(job.flow_count())
        .channel(channel)
        .flops_per_byte(opts.flops_per_byte)
        .build();
    engine.spawn("sender", src, |ctx| sender.run(ctx));
    let received = engine.spawn("receiver", dst, |ctx| receiver.run(ctx));

    log::info!(
        "Transferring job {} over {route}: {} in {} flows",
        job.job_id(),
        job.total_bytes(),
        job.flow_count()
    );
    let settled = engine.run()?;
    if let Some(sizes) = received.join() {
        log::info!(
            "Received {} in {} flows",
            sizes.into_iter().sum::<Bytes>(),
            job.flow_count()
        );
    }
    log::info!("Simulation time: {}", settled.clock());

    let summary = EnergySummary::collect(&settled);
    Ok(EnergyReport::new(&job, &route, summary))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    MalformedRoute(#[from] RouteKeyError),

    #[error("host {0:?} is not part of the platform")]
    UnknownHost(String),

    #[error("{0:?} is a router, transfers run between end hosts")]
    NotAHost(String),

    #[error("no route from {src} to {dst}")]
    NoRoute { src: String, dst: String },

    #[error("sender and receiver disagree on the number of flows: {blocked:?} never finished ({unmatched:?} left on the channel)")]
    FlowCountMismatch {
        blocked: Vec<String>,
        unmatched: Vec<Unmatched>,
    },

    #[error(transparent)]
    Sim(SimError),
}

impl From<SimError> for Error {
    /// A stall that leaves operations waiting on a channel means the actors disagreed on how
    /// many flows to exchange.
    fn from(e: SimError) -> Self {
        match e {
            SimError::Stalled {
                blocked, unmatched, ..
            } if !unmatched.is_empty() => Error::FlowCountMismatch { blocked, unmatched },
            e => Error::Sim(e),
        }
    }
}
