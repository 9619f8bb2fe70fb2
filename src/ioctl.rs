use crate::priv_prelude::*;

ioctl_sys::ioctl!(bad read siocgifflags with 0x8913; libc::ifreq);
ioctl_sys::ioctl!(bad write siocsifflags with 0x8914; libc::ifreq);
ioctl_sys::ioctl!(bad write siocsifaddr with 0x8916; libc::ifreq);
ioctl_sys::ioctl!(bad write siocsifnetmask with 0x891c; libc::ifreq);
ioctl_sys::ioctl!(bad read siocgifhwaddr with 0x8927; libc::ifreq);
ioctl_sys::ioctl!(bad write siocaddrt with 0x890b; libc::rtentry);
ioctl_sys::ioctl!(write tunsetiff with b'T', 202; c_int);
