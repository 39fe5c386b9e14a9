//! Fluid transfer model.
//!
//! A transfer first waits out the propagation latency of its route, then streams its bytes.
//! Streaming transfers share link bandwidth with max-min fairness: the planner repeatedly
//! finds the link offering the smallest fair share, fixes that rate for every transfer
//! crossing it, and removes their consumption from the remaining capacity. Rates are
//! recomputed whenever the set of streaming transfers changes.

use std::collections::BTreeMap;

use futures::channel::oneshot;

use crate::platform::{LinkId, Platform};
use crate::sim::comm::Payload;
use crate::units::Nanosecs;

/// Bytes below which a streaming transfer counts as delivered.
const RESIDUE: f64 = 1e-6;

identifier!(TransferId, usize);

/// Resolution of a matched send/receive pair.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) payload: Payload,
    pub(crate) sent: oneshot::Sender<()>,
    pub(crate) received: oneshot::Sender<Payload>,
}

impl Delivery {
    fn complete(self) {
        // A dropped handle means its actor no longer waits on it
        let _ = self.sent.send(());
        let _ = self.received.send(self.payload);
    }
}

#[derive(Debug)]
struct Transfer {
    id: TransferId,
    route: Vec<LinkId>,
    latency_left: Nanosecs,
    /// Bytes still to stream.
    remaining: f64,
    /// Bytes per second; only meaningful once streaming.
    rate: f64,
    delivery: Delivery,
}

impl Transfer {
    fn is_streaming(&self) -> bool {
        self.latency_left == Nanosecs::ZERO
    }

    fn is_done(&self) -> bool {
        self.is_streaming() && self.remaining <= RESIDUE
    }

    /// Time until this transfer changes phase or completes, assuming its rate holds.
    fn time_to_next_phase(&self) -> Nanosecs {
        if !self.is_streaming() {
            self.latency_left
        } else if self.remaining <= RESIDUE || self.rate.is_infinite() {
            Nanosecs::ZERO
        } else if self.rate <= 0.0 {
            Nanosecs::MAX
        } else {
            Nanosecs::from_secs_f64(self.remaining / self.rate)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Fluid {
    transfers: Vec<Transfer>,
    next_id: usize,
}

impl Fluid {
    pub(crate) fn start(&mut self, platform: &Platform, route: Vec<LinkId>, delivery: Delivery) {
        let id = TransferId::new(self.next_id);
        self.next_id += 1;
        let latency_left = platform.latency(&route);
        log::debug!(
            "transfer {id} starts: {} over {} links",
            delivery.payload.size(),
            route.len()
        );
        self.transfers.push(Transfer {
            id,
            route,
            latency_left,
            remaining: delivery.payload.size().into_f64(),
            rate: 0.0,
            delivery,
        });
        self.reshare(platform);
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Time until the next phase change of any transfer.
    pub(crate) fn next_event(&self) -> Option<Nanosecs> {
        self.transfers
            .iter()
            .map(Transfer::time_to_next_phase)
            .filter(|&t| t != Nanosecs::MAX)
            .min()
    }

    /// Advances every transfer by `dt`, completes finished transfers, and re-plans rates.
    ///
    /// PRECONDITION: `dt` does not exceed `next_event()`.
    pub(crate) fn advance(&mut self, platform: &Platform, dt: Nanosecs) {
        let secs = dt.into_secs_f64();
        let mut phase_changed = false;
        for t in &mut self.transfers {
            if t.is_streaming() {
                if t.rate.is_infinite() {
                    t.remaining = 0.0;
                } else {
                    t.remaining -= t.rate * secs;
                }
            } else {
                t.latency_left = t.latency_left.saturating_sub(dt);
                phase_changed |= t.is_streaming();
            }
        }
        let before = self.transfers.len();
        let (done, active): (Vec<_>, Vec<_>) =
            self.transfers.drain(..).partition(Transfer::is_done);
        self.transfers = active;
        for t in done {
            log::debug!("transfer {} delivered", t.id);
            t.delivery.complete();
        }
        if phase_changed || self.transfers.len() != before {
            self.reshare(platform);
        }
    }

    /// Bits per second currently carried by each link.
    pub(crate) fn link_usage(&self) -> BTreeMap<LinkId, f64> {
        let mut usage = BTreeMap::new();
        for t in self.transfers.iter().filter(|t| t.is_streaming()) {
            if t.rate.is_finite() {
                for &l in &t.route {
                    *usage.entry(l).or_insert(0.0) += t.rate * 8.0;
                }
            }
        }
        usage
    }

    /// Max-min fair bandwidth allocation over streaming transfers.
    fn reshare(&mut self, platform: &Platform) {
        let mut capacity = BTreeMap::new();
        let mut unfixed = Vec::new();
        for (i, t) in self.transfers.iter_mut().enumerate() {
            if !t.is_streaming() {
                continue;
            }
            if t.route.is_empty() {
                // Loopback transfers are not bandwidth-limited
                t.rate = f64::INFINITY;
                continue;
            }
            for &l in &t.route {
                capacity
                    .entry(l)
                    .or_insert_with(|| platform.link(l).bandwidth.bytes_per_sec());
            }
            unfixed.push(i);
        }
        while !unfixed.is_empty() {
            let mut crossing: BTreeMap<LinkId, usize> = BTreeMap::new();
            for &i in &unfixed {
                for &l in &self.transfers[i].route {
                    *crossing.entry(l).or_insert(0) += 1;
                }
            }
            // The bottleneck is the link offering the smallest fair share
            let Some((bottleneck, share)) = crossing
                .iter()
                .map(|(&l, &n)| (l, capacity[&l] / n as f64))
                .min_by(|a, b| a.1.total_cmp(&b.1))
            else {
                break;
            };
            let (fixed, rest): (Vec<usize>, Vec<usize>) = unfixed
                .into_iter()
                .partition(|&i| self.transfers[i].route.contains(&bottleneck));
            for i in fixed {
                let t = &mut self.transfers[i];
                t.rate = share.max(0.0);
                for l in &t.route {
                    if let Some(c) = capacity.get_mut(l) {
                        *c -= t.rate;
                    }
                }
            }
            unfixed = rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::units::Bytes;

    fn delivery(flow: usize, size: u64) -> (Delivery, oneshot::Receiver<Payload>) {
        let (sent, _) = oneshot::channel();
        let (received, rx) = oneshot::channel();
        let payload = Payload::new(flow, Bytes::new(size));
        let delivery = Delivery {
            payload,
            sent,
            received,
        };
        (delivery, rx)
    }

    #[test]
    fn single_transfer_streams_at_link_rate() {
        let platform = testing::point_to_point_platform();
        let route = platform
            .route(
                platform.host_id("nodeA").unwrap(),
                platform.host_id("nodeB").unwrap(),
            )
            .unwrap();
        let mut fluid = Fluid::default();
        let (d, mut rx) = delivery(0, 1_000_000);
        fluid.start(&platform, route, d);
        assert_eq!(fluid.next_event(), Some(Nanosecs::from_secs(1)));
        fluid.advance(&platform, Nanosecs::from_secs(1));
        assert!(fluid.is_idle());
        let payload = rx.try_recv().unwrap().unwrap();
        assert_eq!(payload.size(), Bytes::new(1_000_000));
    }

    #[test]
    fn concurrent_transfers_share_fairly() {
        let platform = testing::point_to_point_platform();
        let route = platform
            .route(
                platform.host_id("nodeA").unwrap(),
                platform.host_id("nodeB").unwrap(),
            )
            .unwrap();
        let mut fluid = Fluid::default();
        let (small, _) = delivery(0, 250_000);
        let (large, _) = delivery(1, 750_000);
        fluid.start(&platform, route.clone(), small);
        fluid.start(&platform, route.clone(), large);
        // Half the link each: the small transfer finishes after 0.5 s
        assert_eq!(fluid.next_event(), Some(Nanosecs::from_millis(500)));
        fluid.advance(&platform, Nanosecs::from_millis(500));
        assert_eq!(fluid.transfers.len(), 1);
        // The large one then gets the whole link for its last 500 KB
        assert_eq!(fluid.next_event(), Some(Nanosecs::from_millis(500)));
        let usage = fluid.link_usage();
        assert_eq!(usage.values().copied().collect::<Vec<_>>(), [8_000_000.0]);
    }

    #[test]
    fn latency_precedes_streaming() {
        let platform = testing::line_platform();
        let route = platform
            .route(
                platform.host_id("nodeA").unwrap(),
                platform.host_id("nodeB").unwrap(),
            )
            .unwrap();
        let mut fluid = Fluid::default();
        let (d, _) = delivery(0, 0);
        fluid.start(&platform, route, d);
        assert!(fluid.link_usage().is_empty());
        let latency = testing::LINK_LATENCY + testing::LINK_LATENCY;
        assert_eq!(fluid.next_event(), Some(latency));
        fluid.advance(&platform, latency);
        // An empty payload is delivered as soon as the latency has elapsed
        assert!(fluid.is_idle());
    }
}
