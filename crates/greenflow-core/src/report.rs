//! The energy report written for every transfer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::energy::EnergySummary;
use crate::job::JobDescriptor;
use crate::route::RouteKey;
use crate::units::Joules;

/// Everything known about one transfer once its run has settled. Maps are ordered by name, so
/// equal reports serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnergyReport {
    /// Simulated seconds until both actors finished.
    pub transfer_duration: f64,
    pub job_id: String,
    pub job_size_bytes: u64,
    pub flow_count: usize,
    pub route_key: String,
    pub source_node: String,
    pub destination_node: String,
    pub host_energy: BTreeMap<String, Joules>,
    pub link_energy: BTreeMap<String, Joules>,
    pub total_energy_hosts: Joules,
    pub total_link_energy: Joules,
}

impl EnergyReport {
    pub fn new(job: &JobDescriptor, route: &RouteKey, summary: EnergySummary) -> Self {
        Self {
            transfer_duration: summary.duration.into_secs_f64(),
            job_id: job.job_id().to_owned(),
            job_size_bytes: job.total_bytes().into_u64(),
            flow_count: job.flow_count(),
            route_key: route.key().to_owned(),
            source_node: route.source().to_owned(),
            destination_node: route.destination().to_owned(),
            host_energy: summary.hosts,
            link_energy: summary.links,
            total_energy_hosts: summary.total_hosts,
            total_link_energy: summary.total_links,
        }
    }

    /// Name of the file this report is stored in. Reports for the same route and job share it.
    pub fn file_name(&self) -> String {
        format!(
            "energy_consumption_{}_{}_.json",
            self.route_key, self.job_id
        )
    }

    /// Serializes the report as JSON indented by four spaces.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Bytes, Nanosecs};

    fn report() -> anyhow::Result<EnergyReport> {
        let job = JobDescriptor::new("job-7", 4, Bytes::new(1000))?;
        let route = RouteKey::parse("nodeA_nodeB")?;
        let summary = EnergySummary {
            duration: Nanosecs::from_millis(1500),
            hosts: [
                ("nodeB".to_owned(), Joules::new(2.5)),
                ("nodeA".to_owned(), Joules::new(1.5)),
            ]
            .into_iter()
            .collect(),
            links: [("l1".to_owned(), Joules::new(0.25))].into_iter().collect(),
            total_hosts: Joules::new(4.0),
            total_links: Joules::new(0.25),
        };
        Ok(EnergyReport::new(&job, &route, summary))
    }

    #[test]
    fn json_layout() -> anyhow::Result<()> {
        let json = String::from_utf8(report()?.to_json()?)?;
        insta::assert_snapshot!(json, @r###"
        {
            "transfer_duration": 1.5,
            "job_id": "job-7",
            "job_size_bytes": 1000,
            "flow_count": 4,
            "route_key": "nodeA_nodeB",
            "source_node": "nodeA",
            "destination_node": "nodeB",
            "host_energy": {
                "nodeA": 1.5,
                "nodeB": 2.5
            },
            "link_energy": {
                "l1": 0.25
            },
            "total_energy_hosts": 4.0,
            "total_link_energy": 0.25
        }
        "###);
        Ok(())
    }

    #[test]
    fn identical_inputs_serialize_identically() -> anyhow::Result<()> {
        assert_eq!(report()?.to_json()?, report()?.to_json()?);
        Ok(())
    }

    #[test]
    fn file_name_carries_route_and_job() -> anyhow::Result<()> {
        assert_eq!(
            report()?.file_name(),
            "energy_consumption_nodeA_nodeB_job-7_.json"
        );
        Ok(())
    }
}
