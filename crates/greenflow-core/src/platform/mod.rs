//! The simulated platform: hosts, routers, links, and the routes between them.

mod routing;
pub(crate) mod topology;
pub mod types;

use petgraph::graph::NodeIndex;

pub use topology::Error as PlatformError;
pub use types::*;

use crate::units::Nanosecs;

use self::{routing::Routes, topology::Topology};

/// A validated platform with precomputed routes.
#[derive(Debug, Clone)]
pub struct Platform {
    topology: Topology,
    routes: Routes,
}

impl Platform {
    pub fn new(hosts: &[Host], links: &[Link]) -> Result<Self, PlatformError> {
        let topology = Topology::new(hosts, links)?;
        let routes = Routes::new(&topology);
        Ok(Self { topology, routes })
    }

    pub fn host_id(&self, name: &str) -> Option<HostId> {
        self.topology.host_ids.get(name).copied()
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.topology.link_ids.get(name).copied()
    }

    /// PRECONDITION: `id` was issued by this platform.
    pub fn host(&self, id: HostId) -> &Host {
        &self.topology.graph[NodeIndex::new(id.inner())]
    }

    /// PRECONDITION: `id` was issued by this platform.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.topology.links[id.inner()]
    }

    /// Returns the links traversed from `src` to `dst`, or `None` if `dst` is unreachable. A
    /// host reaches itself over an empty route. Among equal-cost next hops the lowest host ID
    /// is taken, so a route is always the same for the same platform.
    pub fn route(&self, src: HostId, dst: HostId) -> Option<Vec<LinkId>> {
        let mut acc = Vec::new();
        let mut cur = src;
        while cur != dst {
            let next = *self.routes.next_hops(cur, dst)?.first()?;
            let i = NodeIndex::new(cur.inner());
            let j = NodeIndex::new(next.inner());
            // Next hops are always neighbors in a valid topology
            let e = self.topology.graph.find_edge(i, j)?;
            acc.push(self.topology.graph[e]);
            cur = next;
        }
        Some(acc)
    }

    /// Total propagation latency along a route.
    pub fn latency(&self, route: &[LinkId]) -> Nanosecs {
        route.iter().map(|&l| self.link(l).latency).sum()
    }

    pub fn host_ids(&self) -> impl Iterator<Item = HostId> {
        (0..self.nr_hosts()).map(HostId::new)
    }

    pub fn link_ids(&self) -> impl Iterator<Item = LinkId> {
        (0..self.nr_links()).map(LinkId::new)
    }

    delegate::delegate! {
        to self.topology.graph {
            #[call(node_weights)]
            pub fn hosts(&self) -> impl Iterator<Item = &Host>;

            #[call(node_count)]
            pub fn nr_hosts(&self) -> usize;
        }

        to self.topology.links {
            #[call(iter)]
            pub fn links(&self) -> impl Iterator<Item = &Link>;

            #[call(len)]
            pub fn nr_links(&self) -> usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;
    use crate::testing;

    #[test]
    fn route_crosses_router() -> anyhow::Result<()> {
        let platform = testing::line_platform();
        let a = platform.host_id("nodeA").context("missing nodeA")?;
        let b = platform.host_id("nodeB").context("missing nodeB")?;
        let route = platform.route(a, b).context("no route")?;
        let names = route
            .iter()
            .map(|&l| platform.link(l).name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["l1", "l2"]);
        assert_eq!(platform.latency(&route), testing::LINK_LATENCY + testing::LINK_LATENCY);
        Ok(())
    }

    #[test]
    fn route_to_self_is_empty() -> anyhow::Result<()> {
        let platform = testing::line_platform();
        let a = platform.host_id("nodeA").context("missing nodeA")?;
        assert_eq!(platform.route(a, a), Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn unreachable_host_has_no_route() -> anyhow::Result<()> {
        let (hosts, links) = testing::host_chain_config();
        let platform = Platform::new(&hosts, &links)?;
        assert_eq!(platform.route(HostId::new(0), HostId::new(2)), None);
        Ok(())
    }

    #[test]
    fn ecmp_choice_is_stable() -> anyhow::Result<()> {
        let platform = testing::diamond_platform();
        let a = platform.host_id("nodeA").context("missing nodeA")?;
        let b = platform.host_id("nodeB").context("missing nodeB")?;
        let first = platform.route(a, b).context("no route")?;
        for _ in 0..10 {
            assert_eq!(platform.route(a, b).as_ref(), Some(&first));
        }
        // Both equal-cost paths have three links
        assert_eq!(first.len(), 3);
        Ok(())
    }
}
