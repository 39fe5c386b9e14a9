use std::collections::VecDeque;

use petgraph::{
    graph::NodeIndex,
    visit::{VisitMap, Visitable},
};
use rustc_hash::FxHashMap;

use crate::platform::{
    topology::Topology,
    types::{HostId, HostKind},
};

type HopMatrix = Vec<HopMap>;
type HopMap = Vec<Vec<HostId>>;

/// A next-hop routing matrix constructed with BFS. Traffic only transits routers.
#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct Routes {
    inner: HopMatrix,
}

impl Routes {
    /// Builds a routing table from a topology using BFS.
    pub(crate) fn new(topology: &Topology) -> Self {
        let g = &topology.graph;
        let nr_hosts = g.node_count();
        let mut hops = vec![vec![Vec::new(); nr_hosts]; nr_hosts];
        for start in g.node_indices() {
            let mut discovered = g.visit_map();
            discovered.visit(start);

            let mut queue = VecDeque::new();
            queue.push_back(start);

            let mut distances: FxHashMap<NodeIndex, usize> = [(start, 0)].into_iter().collect();

            while let Some(n) = queue.pop_front() {
                let cur_distance = distances[&n];
                for succ in g.neighbors(n) {
                    if discovered.visit(succ) {
                        distances.insert(succ, cur_distance + 1);
                        if matches!(g[succ].kind, HostKind::Router) {
                            queue.push_back(succ);
                        }
                    }
                    if distances.get(&succ) == Some(&(cur_distance + 1)) {
                        // You can get from `succ` to `start` through `n`
                        let entry: &mut Vec<HostId> = &mut hops[succ.index()][start.index()];
                        let next = HostId::new(n.index());
                        if !entry.contains(&next) {
                            entry.push(next);
                        }
                    }
                }
            }
        }
        // Sorting makes the choice among equal-cost next hops independent of edge order
        for map in &mut hops {
            for choices in map.iter_mut() {
                choices.sort();
            }
        }
        Self { inner: hops }
    }

    /// Returns the candidate next hops from `from` toward `to`, lowest ID first.
    pub(crate) fn next_hops(&self, from: HostId, to: HostId) -> Option<&[HostId]> {
        self.inner
            .get(from.inner())
            .and_then(|map| map.get(to.inner()))
            .map(|hops| hops.as_slice())
    }
}
