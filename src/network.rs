use crate::priv_prelude::*;

/// An IPv4 address range, eg. `10.0.1.0/24`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Network {
    base_addr: Ipv4Addr,
    subnet_mask_bits: u8,
}

fn mask_from_bits(subnet_mask_bits: u8) -> u32 {
    if subnet_mask_bits == 0 { 0 } else { !0u32 << (32 - u32::from(subnet_mask_bits)) }
}

impl Ipv4Network {
    /// The network containing every IPv4 address. Routes to this network are default routes.
    pub const GLOBAL: Ipv4Network = Ipv4Network {
        base_addr: Ipv4Addr::UNSPECIFIED,
        subnet_mask_bits: 0,
    };

    /// Creates a network. Bits of `base_addr` outside the subnet mask are cleared.
    ///
    /// # Panics
    ///
    /// If `subnet_mask_bits` is greater than 32.
    pub fn new(base_addr: Ipv4Addr, subnet_mask_bits: u8) -> Ipv4Network {
        assert!(subnet_mask_bits <= 32);
        let mask = mask_from_bits(subnet_mask_bits);
        let base_addr = Ipv4Addr::from(u32::from(base_addr) & mask);
        Ipv4Network { base_addr, subnet_mask_bits }
    }

    pub fn contains(self, addr: Ipv4Addr) -> bool {
        let mask = mask_from_bits(self.subnet_mask_bits);
        let addr_bits = u32::from(addr) & mask;
        let base_addr_bits = u32::from(self.base_addr);
        addr_bits == base_addr_bits
    }

    pub fn base_addr(self) -> Ipv4Addr {
        self.base_addr
    }

    pub fn subnet_mask_bits(self) -> u8 {
        self.subnet_mask_bits
    }

    /// The subnet mask in dotted-quad form, eg. `255.255.255.0` for a `/24`.
    pub fn netmask(self) -> Ipv4Addr {
        Ipv4Addr::from(mask_from_bits(self.subnet_mask_bits))
    }
}

impl fmt::Debug for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.base_addr, self.subnet_mask_bits)
    }
}

quick_error! {
    /// Error parsing an address in CIDR notation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ParseCidrError {
        MissingSlash {
            display("missing '/' character")
        }
        InvalidAddr(s: String) {
            display("invalid IPv4 address {:?}", s)
        }
        InvalidSubnetMaskBits(s: String) {
            display("invalid subnet mask length {:?}", s)
        }
    }
}

fn parse_cidr(s: &str) -> Result<(Ipv4Addr, u8), ParseCidrError> {
    let (addr, subnet_mask_bits) = match s.split_once('/') {
        None => return Err(ParseCidrError::MissingSlash),
        Some((addr, subnet_mask_bits)) => (addr, subnet_mask_bits),
    };
    let addr = match Ipv4Addr::from_str(addr) {
        Err(_) => return Err(ParseCidrError::InvalidAddr(addr.to_owned())),
        Ok(addr) => addr,
    };
    let subnet_mask_bits = match u8::from_str(subnet_mask_bits) {
        Ok(bits) if bits <= 32 => bits,
        _ => return Err(ParseCidrError::InvalidSubnetMaskBits(subnet_mask_bits.to_owned())),
    };
    Ok((addr, subnet_mask_bits))
}

impl FromStr for Ipv4Network {
    type Err = ParseCidrError;

    fn from_str(s: &str) -> Result<Ipv4Network, ParseCidrError> {
        let (addr, subnet_mask_bits) = parse_cidr(s)?;
        Ok(Ipv4Network::new(addr, subnet_mask_bits))
    }
}

/// The IPv4 configuration of an interface: its address and the length of its subnet mask, as in
/// `10.0.1.2/24`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4IfaceAddr {
    addr: Ipv4Addr,
    subnet_mask_bits: u8,
}

impl Ipv4IfaceAddr {
    /// # Panics
    ///
    /// If `subnet_mask_bits` is greater than 32.
    pub fn new(addr: Ipv4Addr, subnet_mask_bits: u8) -> Ipv4IfaceAddr {
        assert!(subnet_mask_bits <= 32);
        Ipv4IfaceAddr { addr, subnet_mask_bits }
    }

    pub fn addr(self) -> Ipv4Addr {
        self.addr
    }

    pub fn subnet_mask_bits(self) -> u8 {
        self.subnet_mask_bits
    }

    /// The network that the interface is directly attached to.
    pub fn network(self) -> Ipv4Network {
        Ipv4Network::new(self.addr, self.subnet_mask_bits)
    }
}

impl fmt::Debug for Ipv4IfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Ipv4IfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.subnet_mask_bits)
    }
}

impl FromStr for Ipv4IfaceAddr {
    type Err = ParseCidrError;

    fn from_str(s: &str) -> Result<Ipv4IfaceAddr, ParseCidrError> {
        let (addr, subnet_mask_bits) = parse_cidr(s)?;
        Ok(Ipv4IfaceAddr::new(addr, subnet_mask_bits))
    }
}
