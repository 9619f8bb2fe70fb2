use crate::priv_prelude::*;

const HEADER_LEN: usize = 14;

pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86dd;
}

/// An ethernet frame, from the destination MAC address up to the end of the payload. Cloning is
/// cheap: the frame's bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct EtherFrame {
    data: Bytes,
}

impl EtherFrame {
    /// Wraps raw frame bytes. Returns `None` if `data` is too short to hold an ethernet header.
    pub fn from_bytes(data: Bytes) -> Option<EtherFrame> {
        if data.len() < HEADER_LEN {
            return None;
        }
        Some(EtherFrame { data })
    }

    pub fn new(
        destination_mac: MacAddr,
        source_mac: MacAddr,
        ethertype: u16,
        payload: &[u8],
    ) -> EtherFrame {
        let mut data = BytesMut::with_capacity(HEADER_LEN + payload.len());
        data.put_slice(destination_mac.as_bytes());
        data.put_slice(source_mac.as_bytes());
        data.put_u16(ethertype);
        data.put_slice(payload);
        EtherFrame { data: data.freeze() }
    }

    pub fn destination_mac(&self) -> MacAddr {
        MacAddr::from_bytes(std::array::from_fn(|index| self.data[index]))
    }

    pub fn source_mac(&self) -> MacAddr {
        MacAddr::from_bytes(std::array::from_fn(|index| self.data[6 + index]))
    }

    pub fn ethertype(&self) -> u16 {
        u16::from_be_bytes([self.data[12], self.data[13]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for EtherFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut debug = f.debug_struct("EtherFrame");
        debug
        .field("source_mac", &self.source_mac())
        .field("destination_mac", &self.destination_mac());
        match self.ethertype() {
            ethertype::IPV4 if self.payload().len() >= 20 => {
                let payload = self.payload();
                debug
                .field("source_ip", &Ipv4Addr::from([payload[12], payload[13], payload[14], payload[15]]))
                .field("destination_ip", &Ipv4Addr::from([payload[16], payload[17], payload[18], payload[19]]))
                .field("protocol", &payload[9]);
            },
            ethertype::ARP => {
                debug.field("ethertype", &"ARP");
            },
            ethertype::IPV6 => {
                debug.field("ethertype", &"IPv6");
            },
            other => {
                debug.field("ethertype", &format_args!("{:#06x}", other));
            },
        }
        debug.field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_fields() {
        let source_mac = MacAddr::from_bytes([0x02, 0, 0, 0, 0, 1]);
        let frame = EtherFrame::new(MacAddr::BROADCAST, source_mac, ethertype::ARP, &[1, 2, 3]);
        assert_eq!(frame.destination_mac(), MacAddr::BROADCAST);
        assert_eq!(frame.source_mac(), source_mac);
        assert_eq!(frame.ethertype(), ethertype::ARP);
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert_eq!(frame.len(), 17);
        assert_eq!(&frame.as_bytes()[..6], &[0xff; 6]);
    }

    #[test]
    fn runt_frames_are_rejected() {
        assert!(EtherFrame::from_bytes(Bytes::from_static(&[0u8; 13])).is_none());
        assert!(EtherFrame::from_bytes(Bytes::from_static(&[0u8; 14])).is_some());
    }
}
