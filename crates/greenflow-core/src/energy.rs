//! Post-run energy aggregation.

use std::collections::BTreeMap;

use crate::platform::HostKind;
use crate::sim::Settled;
use crate::units::{Joules, Nanosecs};

/// Read access to the final state of a finished run.
pub trait EnergyProbe {
    /// Simulated time at which the run settled.
    fn clock(&self) -> Nanosecs;

    /// Cumulative energy of every end host, keyed by name. Routers are not metered, so they
    /// are left out.
    fn host_readings(&self) -> Vec<(String, Joules)>;

    /// Cumulative energy of every link, keyed by name.
    fn link_readings(&self) -> Vec<(String, Joules)>;
}

impl EnergyProbe for Settled {
    fn clock(&self) -> Nanosecs {
        Settled::clock(self)
    }

    fn host_readings(&self) -> Vec<(String, Joules)> {
        self.platform()
            .hosts()
            .filter(|h| h.kind == HostKind::Host)
            .filter_map(|h| Some((h.name.clone(), self.host_energy(&h.name)?)))
            .collect()
    }

    fn link_readings(&self) -> Vec<(String, Joules)> {
        self.platform()
            .links()
            .filter_map(|l| Some((l.name.clone(), self.link_energy(&l.name)?)))
            .collect()
    }
}

/// Per-host and per-link energy of one run, ordered by name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnergySummary {
    pub duration: Nanosecs,
    pub hosts: BTreeMap<String, Joules>,
    pub links: BTreeMap<String, Joules>,
    pub total_hosts: Joules,
    pub total_links: Joules,
}

impl EnergySummary {
    pub fn collect(probe: &impl EnergyProbe) -> Self {
        let hosts = probe.host_readings().into_iter().collect::<BTreeMap<_, _>>();
        let links = probe.link_readings().into_iter().collect::<BTreeMap<_, _>>();
        let total_hosts = hosts.values().copied().sum();
        let total_links = links.values().copied().sum();
        log::info!("Hosts consumed {total_hosts}, links consumed {total_links}");
        Self {
            duration: probe.clock(),
            hosts,
            links,
            total_hosts,
            total_links,
        }
    }
}
