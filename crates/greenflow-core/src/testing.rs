//! Fixtures shared by tests across the workspace.

use crate::platform::{Host, HostPower, Link, LinkPower, Platform};
use crate::units::{BitsPerSec, Flops, Nanosecs, Watts};

pub(crate) const LINK_LATENCY: Nanosecs = Nanosecs::from_millis(1);

pub(crate) fn host_power() -> HostPower {
    HostPower {
        idle: Watts::new(100.0),
        max: Watts::new(200.0),
    }
}

pub(crate) fn link_power() -> LinkPower {
    LinkPower {
        idle: Watts::new(10.0),
        busy: Watts::new(20.0),
    }
}

fn link(name: &str, a: &str, b: &str) -> Link {
    Link::new(name, a, b, BitsPerSec::new(10_000_000_000), LINK_LATENCY).with_power(link_power())
}

/// `nodeA -- r1 -- nodeB`, joined by 10 Gbps links.
pub(crate) fn line_config() -> (Vec<Host>, Vec<Link>) {
    let speed = Flops::new(1e9);
    let hosts = vec![
        Host::new_host("nodeA", speed, host_power()),
        Host::new_router("r1", speed, host_power()),
        Host::new_host("nodeB", speed, host_power()),
    ];
    let links = vec![link("l1", "nodeA", "r1"), link("l2", "r1", "nodeB")];
    (hosts, links)
}

pub(crate) fn line_platform() -> Platform {
    let (hosts, links) = line_config();
    Platform::new(&hosts, &links).expect("line platform is valid")
}

/// Three end hosts in a chain with no router between them.
pub(crate) fn host_chain_config() -> (Vec<Host>, Vec<Link>) {
    let speed = Flops::new(1e9);
    let hosts = vec![
        Host::new_host("nodeA", speed, host_power()),
        Host::new_host("nodeB", speed, host_power()),
        Host::new_host("nodeC", speed, host_power()),
    ];
    let links = vec![link("ab", "nodeA", "nodeB"), link("bc", "nodeB", "nodeC")];
    (hosts, links)
}

/// `nodeA -- r1`, which reaches `nodeB` through either `r2` or `r3`.
pub(crate) fn diamond_platform() -> Platform {
    let speed = Flops::new(1e9);
    let hosts = vec![
        Host::new_host("nodeA", speed, host_power()),
        Host::new_router("r1", speed, host_power()),
        Host::new_router("r2", speed, host_power()),
        Host::new_router("r3", speed, host_power()),
        Host::new_host("nodeB", speed, host_power()),
    ];
    let links = vec![
        link("a1", "nodeA", "r1"),
        link("12", "r1", "r2"),
        link("13", "r1", "r3"),
        link("2b", "r2", "nodeB"),
        link("3b", "r3", "nodeB"),
    ];
    Platform::new(&hosts, &links).expect("diamond platform is valid")
}

/// Two hosts joined by a single link with round numbers: the link moves 1 MB per second with
/// no propagation delay, and each host computes 1 Mflop per second.
pub(crate) fn point_to_point_platform() -> Platform {
    let speed = Flops::new(1e6);
    let hosts = vec![
        Host::new_host("nodeA", speed, host_power()),
        Host::new_host("nodeB", speed, host_power()),
    ];
    let links = vec![
        Link::new("ab", "nodeA", "nodeB", BitsPerSec::new(8_000_000), Nanosecs::ZERO)
            .with_power(link_power()),
    ];
    Platform::new(&hosts, &links).expect("point-to-point platform is valid")
}
