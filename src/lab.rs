//! The three-router lab: three edge subnets, each behind its own router, with the routers joined
//! pairwise by point-to-point subnets.
//!
//! ```text
//!   H1 H2            H3 H4            H5 H6
//!     \ /              \ /              \ /
//!     s1               s2               s3
//!  10.0.1.0/24      10.0.2.0/24      10.0.3.0/24
//!      |                |                |
//!      R1 --- s4 ------ R2 --- s5 ------ R3
//!      |   10.0.4.0/24      10.0.5.0/24  |
//!      +------------- s6 ----------------+
//!                  10.0.6.0/24
//! ```

use crate::priv_prelude::*;
use crate::cli;
use crate::config::LabConfig;
use crate::net::Network;
use crate::topology::Topology;

pub const ROUTERS: [&str; 3] = ["R1", "R2", "R3"];

/// Declares the lab's routers, switches, hosts and links.
pub fn topology() -> Topology {
    let mut topology = Topology::new();
    topology
    .add_router("R1", Some(ipv4_iface_addr!("10.0.1.1/24")))
    .add_router("R2", Some(ipv4_iface_addr!("10.0.2.1/24")))
    .add_router("R3", Some(ipv4_iface_addr!("10.0.3.1/24")));
    for switch in ["s1", "s2", "s3", "s4", "s5", "s6"] {
        topology.add_switch(switch);
    }

    topology.add_link("R1", "s1").iface_name("R1-eth1").ipv4_addr(ipv4_iface_addr!("10.0.1.1/24"));
    topology.add_link("R2", "s2").iface_name("R2-eth2").ipv4_addr(ipv4_iface_addr!("10.0.2.1/24"));
    topology.add_link("R3", "s3").iface_name("R3-eth3").ipv4_addr(ipv4_iface_addr!("10.0.3.1/24"));

    let hosts = [
        ("H1", ipv4_iface_addr!("10.0.1.2/24"), ipv4!("10.0.1.1"), "s1"),
        ("H2", ipv4_iface_addr!("10.0.1.3/24"), ipv4!("10.0.1.1"), "s1"),
        ("H3", ipv4_iface_addr!("10.0.2.2/24"), ipv4!("10.0.2.1"), "s2"),
        ("H4", ipv4_iface_addr!("10.0.2.3/24"), ipv4!("10.0.2.1"), "s2"),
        ("H5", ipv4_iface_addr!("10.0.3.2/24"), ipv4!("10.0.3.1"), "s3"),
        ("H6", ipv4_iface_addr!("10.0.3.3/24"), ipv4!("10.0.3.1"), "s3"),
    ];
    for (name, ipv4, gateway, switch) in hosts {
        topology.add_host(name, Some(ipv4), Some(gateway));
        topology.add_link(name, switch);
    }

    topology.add_link("R1", "s4").iface_name("R1-eth4").ipv4_addr(ipv4_iface_addr!("10.0.4.1/24"));
    topology.add_link("R2", "s4").iface_name("R2-eth4").ipv4_addr(ipv4_iface_addr!("10.0.4.2/24"));
    topology.add_link("R2", "s5").iface_name("R2-eth5").ipv4_addr(ipv4_iface_addr!("10.0.5.1/24"));
    topology.add_link("R3", "s5").iface_name("R3-eth5").ipv4_addr(ipv4_iface_addr!("10.0.5.2/24"));
    topology.add_link("R1", "s6").iface_name("R1-eth6").ipv4_addr(ipv4_iface_addr!("10.0.6.1/24"));
    topology.add_link("R3", "s6").iface_name("R3-eth6").ipv4_addr(ipv4_iface_addr!("10.0.6.2/24"));
    topology
}

/// The routes each router needs to reach the two edge subnets it isn't attached to. Each goes
/// via the peer router on the link the two routers share.
pub fn static_routes() -> Vec<(&'static str, Ipv4Route)> {
    vec![
        ("R1", Ipv4Route::new(ipv4_network!("10.0.2.0/24"), Some(ipv4!("10.0.4.2")))),
        ("R1", Ipv4Route::new(ipv4_network!("10.0.3.0/24"), Some(ipv4!("10.0.6.2")))),
        ("R2", Ipv4Route::new(ipv4_network!("10.0.1.0/24"), Some(ipv4!("10.0.4.1")))),
        ("R2", Ipv4Route::new(ipv4_network!("10.0.3.0/24"), Some(ipv4!("10.0.5.2")))),
        ("R3", Ipv4Route::new(ipv4_network!("10.0.1.0/24"), Some(ipv4!("10.0.6.1")))),
        ("R3", Ipv4Route::new(ipv4_network!("10.0.2.0/24"), Some(ipv4!("10.0.5.1")))),
    ]
}

pub async fn install_static_routes(network: &Network) -> Result<(), NetworkError> {
    for (router, route) in static_routes() {
        let gateway = match route.gateway() {
            Some(gateway) => gateway,
            None => continue,
        };
        network.add_route(router, route.destination(), gateway).await?;
    }
    Ok(())
}

/// Writes every router's routing table, in the numeric `route -n` layout, under a banner per
/// router.
pub fn format_routing_tables(tables: &[RoutingTable]) -> String {
    let mut out = String::from("*** Routing Table on Routers:\n");
    for (index, table) in tables.iter().enumerate() {
        out.push_str(&format!("         Routing Table for Router {}           \n", index + 1));
        out.push_str(&table.to_string());
    }
    out
}

/// Prints every router's routing table.
pub async fn print_routing_tables(network: &Network) -> Result<(), NetworkError> {
    let mut tables = Vec::with_capacity(ROUTERS.len());
    for router in ROUTERS {
        tables.push(network.routing_table(router).await?);
    }
    print!("{}", format_routing_tables(&tables));
    Ok(())
}

/// Runs the lab from start to finish: bring the network up, install the static routes, start
/// capturing, let the network settle, ping every pair of nodes, print the routing tables, then
/// hand over to the command loop. The capture is finished and the network stopped on the way out,
/// whether or not the steps in between succeeded.
pub async fn run(config: &LabConfig) -> Result<(), NetworkError> {
    info!("*** Creating network");
    let network = Network::start(&topology()).await?;

    let res = run_started(&network, config).await;

    info!("*** Stopping network");
    let stop_res = network.stop().await;
    res?;
    stop_res
}

async fn run_started(network: &Network, config: &LabConfig) -> Result<(), NetworkError> {
    info!("*** Installing static routes");
    install_static_routes(network).await?;

    let capture = network.capture(&config.capture_node, &config.capture_path).await?;
    let res = exercise(network, config).await;

    let finish_res = capture.finish().await;
    if let Ok(num_frames) = finish_res {
        info!(
            "*** Captured {} frames on {} to {}",
            num_frames,
            config.capture_node,
            config.capture_path.display(),
        );
    }
    res?;
    finish_res?;
    Ok(())
}

async fn exercise(network: &Network, config: &LabConfig) -> Result<(), NetworkError> {
    tokio::time::sleep(config.settle_time).await;

    println!("*** Ping: testing ping reachability");
    let report = network.ping_all(config.ping_timeout).await?;
    print!("{}", report);

    print_routing_tables(network).await?;

    if config.interactive {
        cli::run(network, config.ping_timeout).await?;
    }
    Ok(())
}
