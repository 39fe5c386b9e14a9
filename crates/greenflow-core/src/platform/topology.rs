use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::platform::types::{Host, HostId, Link, LinkId};

#[derive(Debug, Clone)]
pub(crate) struct Topology {
    /// Node indices coincide with `HostId`s; edge weights name the link carrying the hop.
    pub(crate) graph: DiGraph<Host, LinkId>,
    pub(crate) links: Vec<Link>,
    pub(crate) host_ids: FxHashMap<String, HostId>,
    pub(crate) link_ids: FxHashMap<String, LinkId>,
}

impl Topology {
    /// Creates a platform topology from a list of hosts and links. This function returns an
    /// error if the given description fails to produce a valid topology. The checks are not
    /// exhaustive.
    ///
    /// Correctness properties:
    ///
    /// - Every host and every link must have a unique name.
    /// - Every host must compute at a positive speed on at least one core, and draw at least as
    ///   much power busy as idle.
    /// - Every link must have distinct endpoints among `hosts` and a positive bandwidth, and draw
    ///   at least as much power busy as idle.
    /// - Every host must be referenced by some link.
    /// - For any two hosts, there must be at most one link between them.
    pub(crate) fn new(hosts: &[Host], links: &[Link]) -> Result<Self, Error> {
        let mut g = DiGraph::new();
        let mut host_ids = FxHashMap::default();
        for (i, host) in hosts.iter().enumerate() {
            // CORRECTNESS: Every host must have a unique name.
            if host_ids.insert(host.name.clone(), HostId::new(i)).is_some() {
                return Err(Error::DuplicateHostName(host.name.clone()));
            }
            if host.speed.into_f64() <= 0.0 || host.cores == 0 {
                return Err(Error::NoComputeCapacity(host.name.clone()));
            }
            if host.power.max < host.power.idle {
                return Err(Error::InvertedPowerRange(host.name.clone()));
            }
            g.add_node(host.clone());
        }
        let mut link_ids = FxHashMap::default();
        let mut referenced = FxHashSet::default();
        for (i, link) in links.iter().enumerate() {
            let id = LinkId::new(i);
            if link_ids.insert(link.name.clone(), id).is_some() {
                return Err(Error::DuplicateLinkName(link.name.clone()));
            }
            // CORRECTNESS: Every link must have distinct endpoints in `hosts`.
            if link.a == link.b {
                return Err(Error::HostAdjacentSelf(link.a.clone()));
            }
            let a = *host_ids.get(&link.a).ok_or_else(|| Error::UndeclaredHost {
                link: link.name.clone(),
                host: link.a.clone(),
            })?;
            let b = *host_ids.get(&link.b).ok_or_else(|| Error::UndeclaredHost {
                link: link.name.clone(),
                host: link.b.clone(),
            })?;
            if link.bandwidth.into_u64() == 0 {
                return Err(Error::ZeroBandwidth(link.name.clone()));
            }
            if link.power.busy < link.power.idle {
                return Err(Error::InvertedPowerRange(link.name.clone()));
            }
            // CORRECTNESS: For any two hosts, there must be at most one link between them.
            let (ia, ib) = (NodeIndex::new(a.inner()), NodeIndex::new(b.inner()));
            if g.find_edge(ia, ib).is_some() {
                return Err(Error::DuplicateLink {
                    h1: link.a.clone(),
                    h2: link.b.clone(),
                });
            }
            referenced.insert(a);
            referenced.insert(b);
            // Hops are unidirectional, but both directions name the same link
            g.add_edge(ia, ib, id);
            g.add_edge(ib, ia, id);
        }
        // CORRECTNESS: Every host must be referenced by some link.
        for host in hosts {
            if !referenced.contains(&host_ids[&host.name]) {
                return Err(Error::IsolatedHost(host.name.clone()));
            }
        }
        Ok(Self {
            graph: g,
            links: links.to_vec(),
            host_ids,
            link_ids,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate host name {0}")]
    DuplicateHostName(String),

    #[error("Duplicate link name {0}")]
    DuplicateLinkName(String),

    #[error("Host {0} is connected to itself")]
    HostAdjacentSelf(String),

    #[error("Link {link} references undeclared host {host}")]
    UndeclaredHost { link: String, host: String },

    #[error("Duplicate links between {h1} and {h2}")]
    DuplicateLink { h1: String, h2: String },

    #[error("Host {0} is not connected to any other host")]
    IsolatedHost(String),

    #[error("Host {0} has no compute capacity")]
    NoComputeCapacity(String),

    #[error("Link {0} has zero bandwidth")]
    ZeroBandwidth(String),

    #[error("{0} draws less power busy than idle")]
    InvertedPowerRange(String),
}
