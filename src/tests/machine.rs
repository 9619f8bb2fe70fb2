use crate::priv_prelude::*;
use crate::ping::Pinger;

fn hostname() -> String {
    let mut buffer = [0u8; 256];
    let res = unsafe { libc::gethostname(buffer.as_mut_ptr() as *mut libc::c_char, buffer.len()) };
    assert_eq!(res, 0);
    let len = buffer.iter().position(|b| *b == 0).unwrap();
    String::from_utf8(buffer[..len].to_vec()).unwrap()
}

#[test]
fn namespace_thread_gets_its_own_hostname() {
    let outer_hostname = hostname();
    let join_handle = namespace::spawn("ns-test", hostname).unwrap();
    assert_eq!(join_handle.join().unwrap(), "ns-test");
    assert_eq!(hostname(), outer_hostname);
}

#[test]
fn machine_runs_futures_to_completion() {
    let machine = Machine::new("m-test").unwrap();
    let value = machine.spawn(async { hostname().len() + 1 }).join_blocking().unwrap();
    assert_eq!(value, Some("m-test".len() + 1));
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_machine_cancels_futures() {
    let machine = Machine::new("m-drop").unwrap();
    let join_handle = machine.spawn(futures::future::pending::<()>());
    drop(machine);
    assert!(join_handle.await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn sysctl_is_per_machine() {
    let machine_0 = Machine::new("m-fwd-0").unwrap();
    let machine_1 = Machine::new("m-fwd-1").unwrap();
    machine_0.set_ip_forwarding(true).await.unwrap();

    let read_ip_forward = || async {
        std::fs::read_to_string("/proc/sys/net/ipv4/ip_forward").unwrap()
    };
    assert_eq!(machine_0.run(read_ip_forward()).await.unwrap().trim(), "1");
    assert_eq!(machine_1.run(read_ip_forward()).await.unwrap().trim(), "0");

    machine_0.set_ip_forwarding(false).await.unwrap();
    assert_eq!(machine_0.run(read_ip_forward()).await.unwrap().trim(), "0");
}

#[tokio::test(flavor = "multi_thread")]
async fn iface_address_shows_up_in_routing_table() {
    let machine = Machine::new("m-iface").unwrap();
    let iface = {
        machine
        .add_ether_iface()
        .name("m-iface-eth0")
        .ipv4_addr(ipv4_iface_addr!("10.0.7.2/24"))
        .await
        .unwrap()
    };
    assert_eq!(iface.name(), "m-iface-eth0");
    assert!(!iface.mac_addr().is_multicast());

    machine.add_ipv4_route(Ipv4Route::default_via(ipv4!("10.0.7.1")), None).await.unwrap();

    let table = machine.routing_table().await.unwrap();
    let attached = table.lookup(ipv4!("10.0.7.99")).unwrap();
    assert_eq!(attached.iface_name, "m-iface-eth0");
    assert_eq!(attached.gateway(), None);
    let default = table.lookup(ipv4!("203.0.113.1")).unwrap();
    assert_eq!(default.destination, Ipv4Network::GLOBAL);
    assert_eq!(default.gateway(), Some(ipv4!("10.0.7.1")));
    assert_eq!(default.flag_letters(), "UG");
}

#[tokio::test(flavor = "multi_thread")]
async fn machines_ping_across_a_switch() {
    let machine_0 = Machine::new("m-ping-0").unwrap();
    let machine_1 = Machine::new("m-ping-1").unwrap();
    let iface_0 = machine_0.add_ether_iface().ipv4_addr(ipv4_iface_addr!("10.0.8.1/24")).await.unwrap();
    let iface_1 = machine_1.add_ether_iface().ipv4_addr(ipv4_iface_addr!("10.0.8.2/24")).await.unwrap();
    assert_ne!(iface_0.mac_addr(), iface_1.mac_addr());

    let mut switch = EtherSwitch::new("s-ping");
    switch.insert_port(iface_0);
    switch.insert_port(iface_1);

    let rtt_opt = machine_0.run(async {
        let mut pinger = Pinger::new().unwrap();
        pinger.ping(ipv4!("10.0.8.2"), Duration::from_secs(5)).await.unwrap()
    }).await.unwrap();
    assert!(rtt_opt.is_some());

    let rtt_opt = machine_0.run(async {
        let mut pinger = Pinger::new().unwrap();
        pinger.ping(ipv4!("10.0.8.77"), Duration::from_millis(300)).await.unwrap()
    }).await.unwrap();
    assert!(rtt_opt.is_none());
}

fn arp_request(sender_mac: MacAddr, sender_addr: Ipv4Addr, target_addr: Ipv4Addr) -> EtherFrame {
    let mut payload = BytesMut::with_capacity(28);
    payload.put_u16(1);
    payload.put_u16(crate::frame::ethertype::IPV4);
    payload.put_u8(6);
    payload.put_u8(4);
    payload.put_u16(1);
    payload.put_slice(sender_mac.as_bytes());
    payload.put_slice(&sender_addr.octets());
    payload.put_slice(&[0u8; 6]);
    payload.put_slice(&target_addr.octets());
    EtherFrame::new(MacAddr::BROADCAST, sender_mac, crate::frame::ethertype::ARP, &payload)
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_frames_are_dropped_on_send() {
    let machine = Machine::new("m-mtu").unwrap();
    let mut iface = machine.add_ether_iface().ipv4_addr(ipv4_iface_addr!("10.0.9.2/24")).await.unwrap();
    let iface_mac = iface.mac_addr();
    let peer_mac = MacAddr::random();

    let oversized = EtherFrame::new(iface_mac, peer_mac, crate::frame::ethertype::IPV4, &[0u8; 1501]);
    assert_eq!(oversized.len(), 1515);
    iface.send(oversized).await.unwrap();

    iface.send(arp_request(peer_mac, ipv4!("10.0.9.1"), ipv4!("10.0.9.2"))).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = iface.next().await.unwrap().unwrap();
            // Skip the machine's own broadcasts, such as IPv6 router solicitations.
            if frame.ethertype() == crate::frame::ethertype::ARP && frame.destination_mac() == peer_mac {
                break frame;
            }
        }
    }).await.unwrap();
    assert_eq!(reply.source_mac(), iface_mac);
    // Opcode 2 (reply), sent from 10.0.9.2.
    assert_eq!(&reply.payload()[6..8], &[0, 2]);
    assert_eq!(&reply.payload()[14..18], &[10, 0, 9, 2]);
}
