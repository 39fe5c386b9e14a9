//! Cumulative energy counters for every host and link.
//!
//! Loads only change at event boundaries, so integrating the instantaneous power over each
//! interval between events is exact.

use std::collections::BTreeMap;

use crate::platform::{HostId, HostKind, LinkId, Platform};
use crate::units::{Joules, Nanosecs};

#[derive(Debug, Clone)]
pub(crate) struct Meter {
    busy_cores: Vec<u32>,
    host_energy: Vec<Joules>,
    link_energy: Vec<Joules>,
}

impl Meter {
    pub(crate) fn new(platform: &Platform) -> Self {
        Self {
            busy_cores: vec![0; platform.nr_hosts()],
            host_energy: vec![Joules::ZERO; platform.nr_hosts()],
            link_energy: vec![Joules::ZERO; platform.nr_links()],
        }
    }

    pub(crate) fn begin_execution(&mut self, host: HostId) {
        self.busy_cores[host.inner()] += 1;
    }

    pub(crate) fn end_execution(&mut self, host: HostId) {
        let busy = &mut self.busy_cores[host.inner()];
        *busy = busy.saturating_sub(1);
    }

    /// Charges every host and link for `dt` at its current load.
    pub(crate) fn accumulate(
        &mut self,
        platform: &Platform,
        dt: Nanosecs,
        link_usage: &BTreeMap<LinkId, f64>,
    ) {
        if dt == Nanosecs::ZERO {
            return;
        }
        for id in platform.host_ids() {
            let host = platform.host(id);
            // Routers only forward traffic and are not metered
            if host.kind == HostKind::Router {
                continue;
            }
            let draw = host.power_draw(self.busy_cores[id.inner()]);
            self.host_energy[id.inner()] += draw.over(dt);
        }
        for id in platform.link_ids() {
            let used = link_usage.get(&id).copied().unwrap_or(0.0);
            let draw = platform.link(id).power_draw(used);
            self.link_energy[id.inner()] += draw.over(dt);
        }
    }

    pub(crate) fn host_energy(&self, host: HostId) -> Joules {
        self.host_energy[host.inner()]
    }

    pub(crate) fn link_energy(&self, link: LinkId) -> Joules {
        self.link_energy[link.inner()]
    }
}
