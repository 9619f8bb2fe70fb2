use crate::priv_prelude::*;

quick_error! {
    /// Problems with a [`Topology`](crate::Topology) declaration.
    #[allow(missing_docs)]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TopologyError {
        DuplicateName(name: String) {
            display("the name {:?} is declared more than once", name)
        }
        UnknownNode(name: String) {
            display("link refers to undeclared node {:?}", name)
        }
        UnknownSwitch(name: String) {
            display("link refers to undeclared switch {:?}", name)
        }
        IfaceNameTooLong(name: String) {
            display("interface name {:?} is longer than {} bytes", name, libc::IF_NAMESIZE - 1)
        }
        DuplicateIface { node: String, iface: String } {
            display("node {:?} has more than one interface named {:?}", node, iface)
        }
        DuplicateAddress(addr: Ipv4Addr) {
            display("address {} is assigned more than once", addr)
        }
    }
}

quick_error! {
    /// Errors returned by [`Network`](crate::Network) operations.
    #[allow(missing_docs)]
    #[derive(Debug)]
    pub enum NetworkError {
        Topology(err: TopologyError) {
            from()
            display("invalid topology: {}", err)
            source(err)
        }
        UnknownNode(name: String) {
            display("no node named {:?}", name)
        }
        NoAddress(name: String) {
            display("node {:?} has no IPv4 address", name)
        }
        Io(err: io::Error) {
            from()
            display("{}", err)
            source(err)
        }
    }
}
