use crate::priv_prelude::*;
use crate::ping::Pinger;
use crate::topology::{NodeKind, Topology};

/// One interface of a running node.
#[derive(Clone, Debug)]
pub struct IfaceInfo {
    pub name: String,
    pub switch: String,
    pub mac_addr: MacAddr,
    pub ipv4_opt: Option<Ipv4IfaceAddr>,
}

/// A host or router of a running [`Network`](crate::Network).
pub struct Node {
    machine: Machine,
    kind: NodeKind,
    primary_addr_opt: Option<Ipv4IfaceAddr>,
    ifaces: Vec<IfaceInfo>,
    tap_point: TapPoint,
}

impl Node {
    pub fn name(&self) -> &str {
        self.machine.name()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The address other nodes ping this node at.
    pub fn primary_addr(&self) -> Option<Ipv4IfaceAddr> {
        self.primary_addr_opt
    }

    pub fn ifaces(&self) -> &[IfaceInfo] {
        &self.ifaces
    }

    /// The machine the node runs on, for running arbitrary futures inside its namespace.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }
}

/// The outcome of a single echo request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingOutcome {
    pub source: String,
    pub destination: String,
    pub rtt_opt: Option<Duration>,
}

/// The results of [`Network::ping_all`](crate::Network::ping_all), in the order the pings were
/// sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PingReport {
    outcomes: Vec<PingOutcome>,
}

impl PingReport {
    pub fn new(outcomes: Vec<PingOutcome>) -> PingReport {
        PingReport { outcomes }
    }

    pub fn outcomes(&self) -> &[PingOutcome] {
        &self.outcomes
    }

    pub fn sent(&self) -> usize {
        self.outcomes.len()
    }

    pub fn received(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.rtt_opt.is_some()).count()
    }

    /// Percentage of pings that got no reply, rounded down.
    pub fn dropped_percent(&self) -> usize {
        if self.outcomes.is_empty() {
            return 0;
        }
        100 * (self.sent() - self.received()) / self.sent()
    }
}

/// Prints one `source -> ...` line per source, naming each destination that replied and putting
/// an `X` for each one that didn't, then a summary line.
impl fmt::Display for PingReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut current_source_opt: Option<&str> = None;
        for outcome in &self.outcomes {
            if current_source_opt != Some(outcome.source.as_str()) {
                if current_source_opt.is_some() {
                    writeln!(f)?;
                }
                write!(f, "{} ->", outcome.source)?;
                current_source_opt = Some(outcome.source.as_str());
            }
            match outcome.rtt_opt {
                Some(_) => write!(f, " {}", outcome.destination)?,
                None => write!(f, " X")?,
            }
        }
        if current_source_opt.is_some() {
            writeln!(f)?;
        }
        writeln!(
            f,
            "*** Results: {}% dropped ({}/{} received)",
            self.dropped_percent(),
            self.received(),
            self.sent(),
        )
    }
}

/// A running network, started from a [`Topology`](crate::Topology).
///
/// Each node is a [`Machine`](crate::Machine) whose interfaces are plugged into learning ethernet
/// switches running on the calling runtime. Routers forward between their interfaces using the
/// kernel's routing table. Dropping the network tears everything down.
pub struct Network {
    nodes: Vec<Node>,
    switches: Vec<EtherSwitch>,
}

impl Network {
    /// Creates the switches, machines and interfaces declared by `topology`. Must be called
    /// within a `tokio` context.
    pub async fn start(topology: &Topology) -> Result<Network, NetworkError> {
        topology.validate()?;
        info!(
            "starting network with {} nodes, {} switches and {} links",
            topology.nodes().len(),
            topology.switches().len(),
            topology.links().len(),
        );

        let mut switches: Vec<EtherSwitch> = {
            topology
            .switches()
            .iter()
            .map(EtherSwitch::new)
            .collect()
        };

        let mut nodes = Vec::with_capacity(topology.nodes().len());
        for node_spec in topology.nodes() {
            let machine = Machine::new(node_spec.name.clone())?;
            if node_spec.kind == NodeKind::Router {
                machine.set_ip_forwarding(true).await?;
            }
            nodes.push(Node {
                machine,
                kind: node_spec.kind,
                primary_addr_opt: topology.primary_addr(&node_spec.name),
                ifaces: Vec::new(),
                tap_point: TapPoint::new(),
            });
        }

        for link in topology.resolved_links() {
            let node = match nodes.iter_mut().find(|node| node.name() == link.node) {
                Some(node) => node,
                None => return Err(NetworkError::UnknownNode(link.node)),
            };
            let mut builder = node.machine.add_ether_iface().name(link.iface_name.clone());
            if let Some(ipv4) = link.ipv4_opt {
                builder = builder.ipv4_addr(ipv4);
            }
            let iface = builder.await?;
            let switch = match switches.iter_mut().find(|switch| switch.name() == link.switch) {
                Some(switch) => switch,
                None => return Err(TopologyError::UnknownSwitch(link.switch).into()),
            };
            debug!("linking {}:{} to {}", link.node, iface.name(), link.switch);
            node.ifaces.push(IfaceInfo {
                name: iface.name().to_owned(),
                switch: link.switch.clone(),
                mac_addr: iface.mac_addr(),
                ipv4_opt: link.ipv4_opt,
            });
            switch.insert_port(Tapped::new(iface, node.tap_point.clone()));
        }

        for node_spec in topology.nodes() {
            if let Some(gateway) = node_spec.default_route_opt {
                let node = match nodes.iter().find(|node| node.name() == node_spec.name) {
                    Some(node) => node,
                    None => return Err(NetworkError::UnknownNode(node_spec.name.clone())),
                };
                node.machine.add_ipv4_route(Ipv4Route::default_via(gateway), None).await?;
            }
        }

        Ok(Network { nodes, switches })
    }

    pub fn node(&self, name: &str) -> Result<&Node, NetworkError> {
        match self.nodes.iter().find(|node| node.name() == name) {
            Some(node) => Ok(node),
            None => Err(NetworkError::UnknownNode(name.to_owned())),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::Host)
    }

    pub fn routers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::Router)
    }

    pub fn switch_names(&self) -> impl Iterator<Item = &str> {
        self.switches.iter().map(EtherSwitch::name)
    }

    /// Installs a static route on `node`. The gateway must be reachable through one of the node's
    /// interfaces.
    pub async fn add_route(
        &self,
        node: &str,
        destination: Ipv4Network,
        gateway: Ipv4Addr,
    ) -> Result<(), NetworkError> {
        let node = self.node(node)?;
        node.machine.add_ipv4_route(Ipv4Route::new(destination, Some(gateway)), None).await?;
        Ok(())
    }

    /// Pings `destination`'s primary address from `source`. Returns the round-trip time, or
    /// `None` if there was no reply within `timeout`.
    pub async fn ping(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<Duration>, NetworkError> {
        let destination_addr = self.addr_of(destination)?;
        self.ping_addr(source, destination_addr, timeout).await
    }

    pub async fn ping_addr(
        &self,
        source: &str,
        destination: Ipv4Addr,
        timeout: Duration,
    ) -> Result<Option<Duration>, NetworkError> {
        let node = self.node(source)?;
        let rtt_opt = node.machine.run(async move {
            let mut pinger = Pinger::new()?;
            pinger.ping(destination, timeout).await
        }).await??;
        Ok(rtt_opt)
    }

    /// Pings every node from every other node, one echo request per pair. Nodes without an IPv4
    /// address are skipped. Nodes are visited in name order.
    pub async fn ping_all(&self, timeout: Duration) -> Result<PingReport, NetworkError> {
        let mut targets: Vec<(String, Ipv4Addr)> = {
            self.nodes
            .iter()
            .filter_map(|node| {
                let addr = node.primary_addr_opt?.addr();
                Some((node.name().to_owned(), addr))
            })
            .collect()
        };
        targets.sort();

        let mut outcomes = Vec::new();
        for (source, _) in &targets {
            let node = self.node(source)?;
            let source = source.clone();
            let destinations: Vec<(String, Ipv4Addr)> = {
                targets
                .iter()
                .filter(|(destination, _)| *destination != source)
                .cloned()
                .collect()
            };
            let source_outcomes = node.machine.run(async move {
                let mut pinger = Pinger::new()?;
                let mut outcomes = Vec::with_capacity(destinations.len());
                for (destination, destination_addr) in destinations {
                    let rtt_opt = pinger.ping(destination_addr, timeout).await?;
                    outcomes.push(PingOutcome {
                        source: source.clone(),
                        destination,
                        rtt_opt,
                    });
                }
                Ok::<_, io::Error>(outcomes)
            }).await??;
            outcomes.extend(source_outcomes);
        }

        let report = PingReport::new(outcomes);
        info!("ping all: {}/{} received", report.received(), report.sent());
        Ok(report)
    }

    pub async fn routing_table(&self, node: &str) -> Result<RoutingTable, NetworkError> {
        let node = self.node(node)?;
        let table = node.machine.routing_table().await?;
        Ok(table)
    }

    /// Starts capturing every frame sent or received on any of `node`'s interfaces to a pcap file
    /// at `path`. The capture runs until [`PacketCapture::finish`](crate::PacketCapture::finish)
    /// is called.
    pub async fn capture(&self, node: &str, path: impl AsRef<Path>) -> Result<PacketCapture, NetworkError> {
        let node = self.node(node)?;
        let capture = PacketCapture::create(path).await?;
        node.tap_point.attach(&capture);
        debug!("capturing on {} ({} interfaces)", node.name(), node.ifaces.len());
        Ok(capture)
    }

    /// Disables forwarding on the routers and shuts down every machine and switch.
    pub async fn stop(self) -> Result<(), NetworkError> {
        for router in self.routers() {
            router.machine.set_ip_forwarding(false).await?;
        }
        info!("stopping network");
        drop(self);
        Ok(())
    }

    fn addr_of(&self, name: &str) -> Result<Ipv4Addr, NetworkError> {
        let node = self.node(name)?;
        match node.primary_addr_opt {
            Some(ipv4) => Ok(ipv4.addr()),
            None => Err(NetworkError::NoAddress(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn outcome(source: &str, destination: &str, received: bool) -> PingOutcome {
        PingOutcome {
            source: source.to_owned(),
            destination: destination.to_owned(),
            rtt_opt: if received { Some(Duration::from_millis(1)) } else { None },
        }
    }

    #[test]
    fn report_format() {
        let report = PingReport::new(vec![
            outcome("H1", "H2", true),
            outcome("H1", "R1", true),
            outcome("H2", "H1", false),
            outcome("H2", "R1", true),
            outcome("R1", "H1", true),
            outcome("R1", "H2", false),
        ]);
        assert_eq!(report.sent(), 6);
        assert_eq!(report.received(), 4);
        assert_eq!(report.dropped_percent(), 33);
        assert_eq!(
            report.to_string(),
            "H1 -> H2 R1\nH2 -> X R1\nR1 -> H1 X\n*** Results: 33% dropped (4/6 received)\n",
        );
    }

    #[test]
    fn empty_report() {
        let report = PingReport::default();
        assert_eq!(report.dropped_percent(), 0);
        assert_eq!(report.to_string(), "*** Results: 0% dropped (0/0 received)\n");
    }
}
