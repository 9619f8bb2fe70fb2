use crate::priv_prelude::*;

const RTF_UP: u16 = libc::RTF_UP as u16;
const RTF_GATEWAY: u16 = libc::RTF_GATEWAY as u16;
const RTF_HOST: u16 = libc::RTF_HOST as u16;
const RTF_REINSTATE: u16 = 0x0008;
const RTF_DYNAMIC: u16 = 0x0010;
const RTF_MODIFIED: u16 = 0x0020;
const RTF_REJECT: u16 = 0x0200;

/// A static IPv4 route.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Route {
    destination: Ipv4Network,
    gateway_opt: Option<Ipv4Addr>,
}

impl Ipv4Route {
    /// A route for packets to `destination`. With a gateway, packets are sent to the gateway's
    /// hardware address. Without one, the destination is expected to be directly attached.
    pub fn new(destination: Ipv4Network, gateway_opt: Option<Ipv4Addr>) -> Ipv4Route {
        Ipv4Route { destination, gateway_opt }
    }

    /// The default route (`0.0.0.0/0`) via `gateway`.
    pub fn default_via(gateway: Ipv4Addr) -> Ipv4Route {
        Ipv4Route::new(Ipv4Network::GLOBAL, Some(gateway))
    }

    pub fn destination(&self) -> Ipv4Network {
        self.destination
    }

    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway_opt
    }
}

impl fmt::Display for Ipv4Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.destination == Ipv4Network::GLOBAL {
            write!(f, "default")?;
        } else {
            write!(f, "{}", self.destination)?;
        }
        if let Some(gateway) = self.gateway_opt {
            write!(f, " via {}", gateway)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ipv4Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// One line of a kernel routing table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    pub iface_name: String,
    pub destination: Ipv4Network,
    pub gateway: Ipv4Addr,
    pub flags: u16,
    pub ref_count: u32,
    pub use_count: u32,
    pub metric: u32,
}

impl RouteEntry {
    pub fn is_up(&self) -> bool {
        self.flags & RTF_UP != 0
    }

    /// The gateway, if packets matching this entry are sent through one.
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        if self.flags & RTF_GATEWAY != 0 {
            Some(self.gateway)
        } else {
            None
        }
    }

    /// The flags in the letter notation used by `route(8)`.
    pub fn flag_letters(&self) -> String {
        let mut letters = String::new();
        for (flag, letter) in [
            (RTF_UP, 'U'),
            (RTF_GATEWAY, 'G'),
            (RTF_HOST, 'H'),
            (RTF_REINSTATE, 'R'),
            (RTF_DYNAMIC, 'D'),
            (RTF_MODIFIED, 'M'),
            (RTF_REJECT, '!'),
        ] {
            if self.flags & flag != 0 {
                letters.push(letter);
            }
        }
        letters
    }
}

/// The IPv4 routing table of a machine, as reported by the kernel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Finds the entry the kernel would use to send to `addr`: the most specific matching
    /// destination, with the lowest metric among equally specific ones.
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&RouteEntry> {
        self.entries
        .iter()
        .filter(|entry| entry.is_up() && entry.destination.contains(addr))
        .max_by_key(|entry| (entry.destination.subnet_mask_bits(), cmp::Reverse(entry.metric)))
    }
}

fn parse_error(line_number: usize, msg: impl fmt::Display) -> io::Error {
    let msg = format!("malformed routing table, line {}: {}", line_number, msg);
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Addresses in `/proc/net/route` are the raw network-order bytes printed as a host-order hex
/// number.
fn parse_hex_addr(line_number: usize, field: &str) -> io::Result<Ipv4Addr> {
    match u32::from_str_radix(field, 16) {
        Ok(value) => Ok(Ipv4Addr::from(value.to_ne_bytes())),
        Err(err) => Err(parse_error(line_number, format!("bad address {:?}: {}", field, err))),
    }
}

fn parse_decimal(line_number: usize, field: &str) -> io::Result<u32> {
    match u32::from_str(field) {
        Ok(value) => Ok(value),
        Err(err) => Err(parse_error(line_number, format!("bad number {:?}: {}", field, err))),
    }
}

impl FromStr for RoutingTable {
    type Err = io::Error;

    /// Parses the contents of `/proc/net/route`.
    fn from_str(s: &str) -> io::Result<RoutingTable> {
        let mut entries = Vec::new();
        // The first line holds the column headings.
        for (index, line) in s.lines().enumerate().skip(1) {
            let line_number = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 8 {
                return Err(parse_error(line_number, format!("expected at least 8 fields, got {}", fields.len())));
            }
            let destination_addr = parse_hex_addr(line_number, fields[1])?;
            let gateway = parse_hex_addr(line_number, fields[2])?;
            let flags = match u16::from_str_radix(fields[3], 16) {
                Ok(flags) => flags,
                Err(err) => return Err(parse_error(line_number, format!("bad flags {:?}: {}", fields[3], err))),
            };
            let ref_count = parse_decimal(line_number, fields[4])?;
            let use_count = parse_decimal(line_number, fields[5])?;
            let metric = parse_decimal(line_number, fields[6])?;
            let mask = parse_hex_addr(line_number, fields[7])?;
            let subnet_mask_bits = u32::from(mask).leading_ones() as u8;
            entries.push(RouteEntry {
                iface_name: fields[0].to_owned(),
                destination: Ipv4Network::new(destination_addr, subnet_mask_bits),
                gateway,
                flags,
                ref_count,
                use_count,
                metric,
            });
        }
        Ok(RoutingTable { entries })
    }
}

/// Displays the table the way `route -n` does.
impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Kernel IP routing table")?;
        writeln!(f, "Destination     Gateway         Genmask         Flags Metric Ref    Use Iface")?;
        for entry in &self.entries {
            writeln!(
                f,
                "{:<15} {:<15} {:<15} {:<5} {:<6} {:<6} {:>3} {}",
                entry.destination.base_addr().to_string(),
                entry.gateway.to_string(),
                entry.destination.netmask().to_string(),
                entry.flag_letters(),
                entry.metric,
                entry.ref_count,
                entry.use_count,
                entry.iface_name,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn proc_hex(addr: Ipv4Addr) -> String {
        format!("{:08X}", u32::from_ne_bytes(addr.octets()))
    }

    fn router_1_table() -> String {
        let mut text = String::from(
            "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n",
        );
        for (iface_name, destination, gateway, flags, mask) in [
            ("R1-eth1", ipv4!("10.0.1.0"), ipv4!("0.0.0.0"), "0001", ipv4!("255.255.255.0")),
            ("R1-eth4", ipv4!("10.0.4.0"), ipv4!("0.0.0.0"), "0001", ipv4!("255.255.255.0")),
            ("R1-eth4", ipv4!("10.0.2.0"), ipv4!("10.0.4.2"), "0003", ipv4!("255.255.255.0")),
            ("R1-eth6", ipv4!("10.0.6.0"), ipv4!("0.0.0.0"), "0001", ipv4!("255.255.255.0")),
            ("R1-eth6", ipv4!("10.0.3.0"), ipv4!("10.0.6.2"), "0003", ipv4!("255.255.255.0")),
        ] {
            text.push_str(&format!(
                "{}\t{}\t{}\t{}\t0\t0\t0\t{}\t0\t0\t0\n",
                iface_name,
                proc_hex(destination),
                proc_hex(gateway),
                flags,
                proc_hex(mask),
            ));
        }
        text
    }

    #[test]
    fn parse_proc_net_route() {
        let table = RoutingTable::from_str(&router_1_table()).unwrap();
        assert_eq!(table.entries().len(), 5);

        let entry = &table.entries()[2];
        assert_eq!(entry.iface_name, "R1-eth4");
        assert_eq!(entry.destination, ipv4_network!("10.0.2.0/24"));
        assert_eq!(entry.gateway(), Some(ipv4!("10.0.4.2")));
        assert_eq!(entry.flag_letters(), "UG");

        assert_eq!(table.entries()[0].gateway(), None);
        assert_eq!(table.entries()[0].flag_letters(), "U");
    }

    #[test]
    fn lookup_prefers_most_specific() {
        let mut text = router_1_table();
        text.push_str(&format!(
            "R1-eth4\t{}\t{}\t0007\t0\t0\t0\t{}\t0\t0\t0\n",
            proc_hex(ipv4!("10.0.3.3")),
            proc_hex(ipv4!("10.0.4.2")),
            proc_hex(ipv4!("255.255.255.255")),
        ));
        let table = RoutingTable::from_str(&text).unwrap();

        assert_eq!(table.lookup(ipv4!("10.0.3.2")).unwrap().gateway(), Some(ipv4!("10.0.6.2")));
        assert_eq!(table.lookup(ipv4!("10.0.3.3")).unwrap().gateway(), Some(ipv4!("10.0.4.2")));
        assert_eq!(table.lookup(ipv4!("10.0.1.9")).unwrap().iface_name, "R1-eth1");
        assert!(table.lookup(ipv4!("192.168.0.1")).is_none());
    }

    #[test]
    fn display_like_route_n() {
        let table = RoutingTable::from_str(&router_1_table()).unwrap();
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Kernel IP routing table");
        assert!(lines[1].starts_with("Destination     Gateway         Genmask"));
        assert_eq!(
            lines[4],
            "10.0.2.0        10.0.4.2        255.255.255.0   UG    0      0        0 R1-eth4",
        );
    }

    #[test]
    fn malformed_lines_are_errors() {
        let text = "Iface\tDestination\tGateway\n eth0\tZZZZ\t00000000\t0001\t0\t0\t0\t00FFFFFF\n";
        let err = RoutingTable::from_str(text).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(RoutingTable::from_str("Iface\n eth0 00000000\n").is_err());
        assert_eq!(RoutingTable::from_str("Iface\tDestination\n").unwrap(), RoutingTable::default());
    }

    #[test]
    fn route_display() {
        assert_eq!(Ipv4Route::default_via(ipv4!("10.0.1.1")).to_string(), "default via 10.0.1.1");
        let route = Ipv4Route::new(ipv4_network!("10.0.3.0/24"), Some(ipv4!("10.0.6.2")));
        assert_eq!(route.to_string(), "10.0.3.0/24 via 10.0.6.2");
        assert_eq!(Ipv4Route::new(ipv4_network!("10.0.3.0/24"), None).to_string(), "10.0.3.0/24");
    }
}
