use crate::priv_prelude::*;

const QUIET_PERIOD: Duration = Duration::from_millis(200);

fn frame(source_mac: MacAddr, destination_mac: MacAddr, marker: u8) -> EtherFrame {
    EtherFrame::new(destination_mac, source_mac, crate::frame::ethertype::IPV4, &[marker; 46])
}

async fn expect_frame(port: &mut EtherChannel, expected: &EtherFrame) {
    let received = {
        tokio::time::timeout(Duration::from_secs(5), port.next())
        .await
        .expect("timed out waiting for frame")
        .expect("switch disconnected")
        .unwrap()
    };
    assert_eq!(&received, expected);
}

async fn expect_silence(port: &mut EtherChannel) {
    if let Ok(frame_opt) = tokio::time::timeout(QUIET_PERIOD, port.next()).await {
        panic!("unexpected frame: {:?}", frame_opt);
    }
}

fn switch_with_ports(num_ports: usize) -> (EtherSwitch, Vec<EtherChannel>) {
    let mut switch = EtherSwitch::new("s-test");
    let mut ends = Vec::with_capacity(num_ports);
    for _ in 0..num_ports {
        let (port, end) = EtherChannel::new(16);
        switch.insert_port(port);
        ends.push(end);
    }
    (switch, ends)
}

#[tokio::test(flavor = "multi_thread")]
async fn floods_unknown_then_learns() {
    let (_switch, mut ends) = switch_with_ports(3);
    let mac_a = MacAddr::random();
    let mac_b = MacAddr::random();

    let to_b = frame(mac_a, mac_b, 1);
    ends[0].send(to_b.clone()).await.unwrap();
    expect_frame(&mut ends[1], &to_b).await;
    expect_frame(&mut ends[2], &to_b).await;

    let to_a = frame(mac_b, mac_a, 2);
    ends[1].send(to_a.clone()).await.unwrap();
    expect_frame(&mut ends[0], &to_a).await;
    expect_silence(&mut ends[2]).await;

    let to_b = frame(mac_a, mac_b, 3);
    ends[0].send(to_b.clone()).await.unwrap();
    expect_frame(&mut ends[1], &to_b).await;
    expect_silence(&mut ends[2]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn broadcast_is_not_reflected() {
    let (_switch, mut ends) = switch_with_ports(3);
    let broadcast = frame(MacAddr::random(), MacAddr::BROADCAST, 4);

    ends[0].send(broadcast.clone()).await.unwrap();
    expect_frame(&mut ends[1], &broadcast).await;
    expect_frame(&mut ends[2], &broadcast).await;
    expect_silence(&mut ends[0]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_for_the_ingress_port_are_filtered() {
    let (_switch, mut ends) = switch_with_ports(2);
    let mac_a = MacAddr::random();
    let mac_c = MacAddr::random();

    ends[0].send(frame(mac_a, MacAddr::BROADCAST, 5)).await.unwrap();
    expect_frame(&mut ends[1], &frame(mac_a, MacAddr::BROADCAST, 5)).await;
    ends[0].send(frame(mac_c, MacAddr::BROADCAST, 6)).await.unwrap();
    expect_frame(&mut ends[1], &frame(mac_c, MacAddr::BROADCAST, 6)).await;

    // Both addresses now live behind port 0.
    ends[0].send(frame(mac_a, mac_c, 7)).await.unwrap();
    expect_silence(&mut ends[1]).await;
    expect_silence(&mut ends[0]).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnected_ports_are_dropped() {
    let (_switch, mut ends) = switch_with_ports(3);
    let mac_a = MacAddr::random();
    let mac_c = MacAddr::random();

    let from_c = frame(mac_c, MacAddr::BROADCAST, 8);
    ends[2].send(from_c.clone()).await.unwrap();
    expect_frame(&mut ends[0], &from_c).await;
    expect_frame(&mut ends[1], &from_c).await;

    drop(ends.pop());
    tokio::time::sleep(QUIET_PERIOD).await;

    // mac_c was learned on the dropped port, so frames for it are flooded again.
    let to_c = frame(mac_a, mac_c, 9);
    ends[0].send(to_c.clone()).await.unwrap();
    expect_frame(&mut ends[1], &to_c).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn switch_stops_when_dropped() {
    let (switch, mut ends) = switch_with_ports(1);
    drop(switch);
    let next = tokio::time::timeout(Duration::from_secs(5), ends[0].next()).await.unwrap();
    assert!(next.is_none());
}
