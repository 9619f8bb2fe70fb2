//! Stand up a small virtual IP network on a single Linux host. *Linux-only*.
//!
//! Every node of the network is a [`Machine`]: a thread living in its own user, network and UTS
//! namespaces and running its own tokio runtime. Nodes get virtual ethernet (TAP) interfaces which
//! are plugged into learning [`EtherSwitch`]es running on the caller's runtime. Forwarding,
//! ARP and routing are done by each namespace's own kernel IP stack, so a node becomes a router
//! simply by enabling IPv4 forwarding.
//!
//! No privileges are needed, only support for unprivileged user namespaces.
//!
//! # Declaring and starting a network
//!
//! ```rust,no_run
//! use routelab::{ipv4_iface_addr, ipv4_network, Network, Topology};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), routelab::NetworkError> {
//! let mut topology = Topology::new();
//! topology
//! .add_router("r1", None)
//! .add_switch("s1")
//! .add_switch("s2")
//! .add_host("h1", Some(ipv4_iface_addr!("192.168.1.2/24")), Some(net_literals::ipv4!("192.168.1.1")))
//! .add_host("h2", Some(ipv4_iface_addr!("192.168.2.2/24")), Some(net_literals::ipv4!("192.168.2.1")));
//! topology.add_link("r1", "s1").ipv4_addr(ipv4_iface_addr!("192.168.1.1/24"));
//! topology.add_link("r1", "s2").ipv4_addr(ipv4_iface_addr!("192.168.2.1/24"));
//! topology.add_link("h1", "s1");
//! topology.add_link("h2", "s2");
//!
//! let network = Network::start(&topology).await?;
//! let report = network.ping_all(Duration::from_secs(1)).await?;
//! print!("{}", report);
//! network.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`lab`] module contains the three-router network this crate's binary runs.

extern crate self as routelab;

mod priv_prelude;
mod namespace;
mod ioctl;
mod machine;
mod network;
mod iface;
mod mac;
pub mod frame;
mod device;
mod capture;
mod route;
mod error;
pub mod icmp;
mod ping;
mod topology;
mod net;
mod config;
pub mod lab;
pub mod cli;

#[cfg(test)]
mod tests;

pub use {
    routelab_macros::{ipv4_iface_addr, ipv4_network},
    machine::{JoinHandle, Machine},
    network::{Ipv4IfaceAddr, Ipv4Network, ParseCidrError},
    iface::{EtherIface, EtherIfaceBuilder},
    mac::MacAddr,
    frame::EtherFrame,
    device::{EtherChannel, EtherSinkStream, EtherSwitch},
    capture::{CapturedFrame, PacketCapture, PcapWriter, TapPoint, Tapped},
    route::{Ipv4Route, RouteEntry, RoutingTable},
    error::{NetworkError, TopologyError},
    ping::Pinger,
    topology::{LinkSpec, NodeKind, NodeSpec, ResolvedLink, Topology},
    net::{IfaceInfo, Network, Node, PingOutcome, PingReport},
    config::LabConfig,
};
