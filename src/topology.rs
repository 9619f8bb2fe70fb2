use crate::priv_prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Host,
    /// A node with IPv4 forwarding enabled.
    Router,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeKind::Host => write!(f, "host"),
            NodeKind::Router => write!(f, "router"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
    /// Given to the node's first interface unless that link sets its own address.
    pub ipv4_opt: Option<Ipv4IfaceAddr>,
    pub default_route_opt: Option<Ipv4Addr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSpec {
    pub node: String,
    pub switch: String,
    pub iface_name_opt: Option<String>,
    pub ipv4_opt: Option<Ipv4IfaceAddr>,
}

impl LinkSpec {
    /// Names the node's end of the link. Defaults to `<node>-eth<n>`.
    pub fn iface_name(&mut self, name: impl Into<String>) -> &mut LinkSpec {
        self.iface_name_opt = Some(name.into());
        self
    }

    pub fn ipv4_addr(&mut self, ipv4_addr: Ipv4IfaceAddr) -> &mut LinkSpec {
        self.ipv4_opt = Some(ipv4_addr);
        self
    }
}

/// A link with its defaults filled in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLink {
    pub node: String,
    pub switch: String,
    pub iface_name: String,
    pub ipv4_opt: Option<Ipv4IfaceAddr>,
}

/// A declaration of hosts, routers and switches, and of the links between nodes and switches.
///
/// Every link joins one interface of a node to a port of a switch. Nothing is created until the
/// topology is passed to [`Network::start`](crate::Network::start).
#[derive(Clone, Debug, Default)]
pub struct Topology {
    nodes: Vec<NodeSpec>,
    switches: Vec<String>,
    links: Vec<LinkSpec>,
}

impl Topology {
    pub fn new() -> Topology {
        Topology::default()
    }

    /// Declares a host. With `default_route_opt` set, the host gets a default route through that
    /// gateway once its interfaces are up.
    pub fn add_host(
        &mut self,
        name: impl Into<String>,
        ipv4_opt: Option<Ipv4IfaceAddr>,
        default_route_opt: Option<Ipv4Addr>,
    ) -> &mut Topology {
        self.nodes.push(NodeSpec {
            name: name.into(),
            kind: NodeKind::Host,
            ipv4_opt,
            default_route_opt,
        });
        self
    }

    pub fn add_router(&mut self, name: impl Into<String>, ipv4_opt: Option<Ipv4IfaceAddr>) -> &mut Topology {
        self.nodes.push(NodeSpec {
            name: name.into(),
            kind: NodeKind::Router,
            ipv4_opt,
            default_route_opt: None,
        });
        self
    }

    pub fn add_switch(&mut self, name: impl Into<String>) -> &mut Topology {
        self.switches.push(name.into());
        self
    }

    /// Links a new interface on `node` to `switch`. Use the returned `LinkSpec` to override the
    /// interface name or address.
    pub fn add_link(&mut self, node: impl Into<String>, switch: impl Into<String>) -> &mut LinkSpec {
        self.links.push(LinkSpec {
            node: node.into(),
            switch: switch.into(),
            iface_name_opt: None,
            ipv4_opt: None,
        });
        let index = self.links.len() - 1;
        &mut self.links[index]
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn switches(&self) -> &[String] {
        &self.switches
    }

    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    /// The links in declaration order, with interface names and addresses defaulted.
    pub fn resolved_links(&self) -> Vec<ResolvedLink> {
        let mut link_counts: HashMap<&str, usize> = HashMap::new();
        let mut resolved = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let link_count = link_counts.entry(link.node.as_str()).or_insert(0);
            let iface_name = match &link.iface_name_opt {
                Some(iface_name) => iface_name.clone(),
                None => format!("{}-eth{}", link.node, link_count),
            };
            let ipv4_opt = match link.ipv4_opt {
                Some(ipv4) => Some(ipv4),
                None if *link_count == 0 => self.node(&link.node).and_then(|node| node.ipv4_opt),
                None => None,
            };
            *link_count += 1;
            resolved.push(ResolvedLink {
                node: link.node.clone(),
                switch: link.switch.clone(),
                iface_name,
                ipv4_opt,
            });
        }
        resolved
    }

    /// The address other nodes reach `name` at: its declared address, or else the address of
    /// its first addressed interface.
    pub fn primary_addr(&self, name: &str) -> Option<Ipv4IfaceAddr> {
        let node = self.node(name)?;
        if let Some(ipv4) = node.ipv4_opt {
            return Some(ipv4);
        }
        self.resolved_links()
        .into_iter()
        .filter(|link| link.node == name)
        .find_map(|link| link.ipv4_opt)
    }

    /// Checks the declaration for mistakes that would otherwise surface half way through
    /// starting the network.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut names = HashSet::new();
        let node_names = self.nodes.iter().map(|node| &node.name);
        for name in node_names.chain(self.switches.iter()) {
            if !names.insert(name.as_str()) {
                return Err(TopologyError::DuplicateName(name.clone()));
            }
        }

        for link in &self.links {
            if self.node(&link.node).is_none() {
                return Err(TopologyError::UnknownNode(link.node.clone()));
            }
            if !self.switches.contains(&link.switch) {
                return Err(TopologyError::UnknownSwitch(link.switch.clone()));
            }
        }

        let mut iface_names = HashSet::new();
        let mut addrs = HashSet::new();
        for link in self.resolved_links() {
            if link.iface_name.len() >= libc::IF_NAMESIZE {
                return Err(TopologyError::IfaceNameTooLong(link.iface_name));
            }
            if !iface_names.insert((link.node.clone(), link.iface_name.clone())) {
                return Err(TopologyError::DuplicateIface {
                    node: link.node,
                    iface: link.iface_name,
                });
            }
            if let Some(ipv4) = link.ipv4_opt {
                if !addrs.insert(ipv4.addr()) {
                    return Err(TopologyError::DuplicateAddress(ipv4.addr()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_hosts() -> Topology {
        let mut topology = Topology::new();
        topology
        .add_switch("s1")
        .add_host("h1", Some(ipv4_iface_addr!("10.0.1.2/24")), None)
        .add_host("h2", Some(ipv4_iface_addr!("10.0.1.3/24")), None);
        topology.add_link("h1", "s1");
        topology.add_link("h2", "s1");
        topology
    }

    #[test]
    fn interface_defaults() {
        let mut topology = two_hosts();
        topology.add_link("h1", "s1");
        topology.add_link("h1", "s1").iface_name("uplink").ipv4_addr(ipv4_iface_addr!("10.0.9.1/24"));

        let links = topology.resolved_links();
        assert_eq!(links[0].iface_name, "h1-eth0");
        assert_eq!(links[0].ipv4_opt, Some(ipv4_iface_addr!("10.0.1.2/24")));
        assert_eq!(links[1].iface_name, "h2-eth0");
        assert_eq!(links[2].iface_name, "h1-eth1");
        assert_eq!(links[2].ipv4_opt, None);
        assert_eq!(links[3].iface_name, "uplink");
        assert_eq!(links[3].ipv4_opt, Some(ipv4_iface_addr!("10.0.9.1/24")));
        assert_eq!(topology.validate(), Ok(()));
    }

    #[test]
    fn primary_addr_falls_back_to_links() {
        let mut topology = two_hosts();
        topology.add_router("r1", None).add_switch("s2");
        topology.add_link("r1", "s2");
        topology.add_link("r1", "s1").ipv4_addr(ipv4_iface_addr!("10.0.1.1/24"));

        assert_eq!(topology.primary_addr("h2"), Some(ipv4_iface_addr!("10.0.1.3/24")));
        assert_eq!(topology.primary_addr("r1"), Some(ipv4_iface_addr!("10.0.1.1/24")));
        assert_eq!(topology.primary_addr("nobody"), None);
    }

    #[test]
    fn duplicate_names() {
        let mut topology = two_hosts();
        topology.add_switch("h1");
        assert_eq!(topology.validate(), Err(TopologyError::DuplicateName(String::from("h1"))));
    }

    #[test]
    fn unknown_endpoints() {
        let mut topology = two_hosts();
        topology.add_link("h3", "s1");
        assert_eq!(topology.validate(), Err(TopologyError::UnknownNode(String::from("h3"))));

        let mut topology = two_hosts();
        topology.add_link("h1", "s9");
        assert_eq!(topology.validate(), Err(TopologyError::UnknownSwitch(String::from("s9"))));
    }

    #[test]
    fn bad_interfaces() {
        let mut topology = two_hosts();
        topology.add_link("h1", "s1").iface_name("h1-eth0");
        assert_eq!(
            topology.validate(),
            Err(TopologyError::DuplicateIface {
                node: String::from("h1"),
                iface: String::from("h1-eth0"),
            }),
        );

        let mut topology = two_hosts();
        topology.add_link("h2", "s1").iface_name("a-very-long-name");
        assert_eq!(
            topology.validate(),
            Err(TopologyError::IfaceNameTooLong(String::from("a-very-long-name"))),
        );
    }

    #[test]
    fn duplicate_addresses() {
        let mut topology = two_hosts();
        topology.add_link("h2", "s1").ipv4_addr(ipv4_iface_addr!("10.0.1.2/24"));
        assert_eq!(topology.validate(), Err(TopologyError::DuplicateAddress(ipv4!("10.0.1.2"))));
    }
}
