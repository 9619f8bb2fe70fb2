use crate::priv_prelude::*;

/// An ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr {
    bytes: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr {
        bytes: [0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
    };

    pub const fn from_bytes(bytes: [u8; 6]) -> MacAddr {
        MacAddr { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// A random, locally administered, unicast address.
    pub fn random() -> MacAddr {
        let mut bytes: [u8; 6] = rand::random();
        bytes[0] &= 0xfc;
        bytes[0] |= 0x02;
        MacAddr { bytes }
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// Whether this is a group address. Broadcast counts as multicast.
    pub fn is_multicast(&self) -> bool {
        self.bytes[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
            self.bytes[4],
            self.bytes[5],
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn random_addrs_are_local_unicast() {
        for _ in 0..100 {
            let mac_addr = MacAddr::random();
            assert!(!mac_addr.is_multicast());
            assert_eq!(mac_addr.as_bytes()[0] & 0x02, 0x02);
        }
    }

    #[test]
    fn group_addrs() {
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::BROADCAST.is_broadcast());
        let ipv6_all_nodes = MacAddr::from_bytes([0x33, 0x33, 0, 0, 0, 1]);
        assert!(ipv6_all_nodes.is_multicast());
        assert!(!ipv6_all_nodes.is_broadcast());
        assert_eq!(ipv6_all_nodes.to_string(), "33:33:00:00:00:01");
    }
}
