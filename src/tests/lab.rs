use crate::priv_prelude::*;
use crate::config::LabConfig;
use crate::lab;
use crate::net::Network;
use crate::topology::Topology;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test(flavor = "multi_thread")]
async fn every_node_reaches_every_other_node() {
    let _ = env_logger::builder().is_test(true).try_init();

    let network = Network::start(&lab::topology()).await.unwrap();
    assert_eq!(network.hosts().count(), 6);
    assert_eq!(network.routers().count(), 3);

    lab::install_static_routes(&network).await.unwrap();

    let report = network.ping_all(PING_TIMEOUT).await.unwrap();
    assert_eq!(report.sent(), 9 * 8);
    assert_eq!(report.received(), report.sent(), "{}", report);
    assert_eq!(report.dropped_percent(), 0);

    network.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn routers_forward_along_static_routes() {
    let network = Network::start(&lab::topology()).await.unwrap();
    lab::install_static_routes(&network).await.unwrap();

    let r1_table = network.routing_table("R1").await.unwrap();
    let to_h3 = r1_table.lookup(ipv4!("10.0.2.2")).unwrap();
    assert_eq!(to_h3.gateway(), Some(ipv4!("10.0.4.2")));
    assert_eq!(to_h3.iface_name, "R1-eth4");
    let to_h5 = r1_table.lookup(ipv4!("10.0.3.2")).unwrap();
    assert_eq!(to_h5.gateway(), Some(ipv4!("10.0.6.2")));
    assert_eq!(to_h5.iface_name, "R1-eth6");

    let h1_table = network.routing_table("H1").await.unwrap();
    let default = h1_table.lookup(ipv4!("10.0.3.3")).unwrap();
    assert_eq!(default.destination, Ipv4Network::GLOBAL);
    assert_eq!(default.gateway(), Some(ipv4!("10.0.1.1")));

    let rtt_opt = network.ping("H1", "H6", PING_TIMEOUT).await.unwrap();
    assert!(rtt_opt.is_some());

    match network.ping("H1", "H9", PING_TIMEOUT).await {
        Err(NetworkError::UnknownNode(name)) => assert_eq!(name, "H9"),
        res => panic!("unexpected result: {:?}", res),
    }

    network.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn capture_records_routed_traffic() {
    let dir = std::env::temp_dir().join(format!("routelab-lab-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("R1.pcap");

    let network = Network::start(&lab::topology()).await.unwrap();
    lab::install_static_routes(&network).await.unwrap();
    let capture = network.capture("R1", &path).await.unwrap();

    let rtt_opt = network.ping("H1", "H3", PING_TIMEOUT).await.unwrap();
    assert!(rtt_opt.is_some());

    // Echo request and reply each cross R1 twice, plus ARP on both sides.
    let num_frames = capture.finish().await.unwrap();
    assert!(num_frames >= 4, "only {} frames captured", num_frames);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..24], &crate::capture::global_header()[..]);
    assert!(bytes.len() > 24 + 4 * 16);

    network.stop().await.unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn pings_without_a_route_are_reported_as_lost() {
    let mut topology = Topology::new();
    topology
    .add_router("r1", Some(ipv4_iface_addr!("192.168.1.1/24")))
    .add_switch("s1")
    .add_switch("s2")
    .add_host("h1", Some(ipv4_iface_addr!("192.168.1.2/24")), None)
    .add_host("h2", Some(ipv4_iface_addr!("192.168.2.2/24")), Some(ipv4!("192.168.2.1")));
    topology.add_link("r1", "s1").ipv4_addr(ipv4_iface_addr!("192.168.1.1/24"));
    topology.add_link("r1", "s2").ipv4_addr(ipv4_iface_addr!("192.168.2.1/24"));
    topology.add_link("h1", "s1");
    topology.add_link("h2", "s2");

    let network = Network::start(&topology).await.unwrap();

    let rtt_opt = network.ping("h1", "h2", Duration::from_millis(300)).await.unwrap();
    assert!(rtt_opt.is_none());

    let report = network.ping_all(Duration::from_millis(300)).await.unwrap();
    assert_eq!(report.sent(), 6);
    let lost: Vec<(&str, &str)> = {
        report
        .outcomes()
        .iter()
        .filter(|outcome| outcome.rtt_opt.is_none())
        .map(|outcome| (outcome.source.as_str(), outcome.destination.as_str()))
        .collect()
    };
    // h1 can't send to h2, and h2's echo request reaches h1 but h1 can't route the reply.
    assert_eq!(lost, [("h1", "h2"), ("h2", "h1")]);
    assert_eq!(report.received(), 4);
    assert!(report.to_string().starts_with("h1 -> X r1\n"), "{}", report);

    network.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn lab_run_leaves_a_complete_capture() {
    let dir = std::env::temp_dir().join(format!("routelab-run-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = LabConfig {
        capture_path: dir.join("R1.pcap"),
        settle_time: Duration::from_millis(100),
        interactive: false,
        ..LabConfig::default()
    };
    lab::run(&config).await.unwrap();

    let bytes = std::fs::read(&config.capture_path).unwrap();
    assert_eq!(&bytes[..24], &crate::capture::global_header()[..]);
    let mut offset = 24;
    let mut num_frames = 0;
    while offset < bytes.len() {
        let incl_len = u32::from_ne_bytes(bytes[offset + 8..offset + 12].try_into().unwrap());
        offset += 16 + incl_len as usize;
        num_frames += 1;
    }
    assert_eq!(offset, bytes.len(), "truncated record");
    // Every ping from or to a node behind R1, or from or to R1 itself, crosses one of its links.
    assert!(num_frames >= 2 * 16, "only {} frames captured", num_frames);

    std::fs::remove_dir_all(&dir).unwrap();
}
