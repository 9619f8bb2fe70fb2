use crate::priv_prelude::*;

pub(crate) fn put_up(iface_name: &str) -> io::Result<()> {
    let mut req = new_req(iface_name)?;
    let fd = new_socket()?;
    unsafe {
        if ioctl::siocgifflags(fd.as_raw_fd(), &mut req) < 0 {
            return Err(io_error_context(iface_name, "SIOCGIFFLAGS"));
        }

        req.ifr_ifru.ifru_flags |= (libc::IFF_UP as u32 | libc::IFF_RUNNING as u32) as i16;

        if ioctl::siocsifflags(fd.as_raw_fd(), &req) < 0 {
            return Err(io_error_context(iface_name, "SIOCSIFFLAGS"));
        }
    }

    Ok(())
}

pub(crate) fn set_ipv4_addr(
    iface_name: &str,
    ipv4_addr: Ipv4Addr,
    subnet_mask_bits: u8,
) -> io::Result<()> {
    let netmask = Ipv4Network::new(ipv4_addr, subnet_mask_bits).netmask();
    let mut req = new_req(iface_name)?;
    let fd = new_socket()?;

    unsafe {
        write_sockaddr_in(&mut req.ifr_ifru.ifru_addr, ipv4_addr);
        if ioctl::siocsifaddr(fd.as_raw_fd(), &req) < 0 {
            return Err(io_error_context(iface_name, "SIOCSIFADDR"));
        }

        write_sockaddr_in(&mut req.ifr_ifru.ifru_netmask, netmask);
        if ioctl::siocsifnetmask(fd.as_raw_fd(), &req) < 0 {
            return Err(io_error_context(iface_name, "SIOCSIFNETMASK"));
        }
    }

    Ok(())
}

pub(crate) fn get_mac_addr(iface_name: &str) -> io::Result<MacAddr> {
    let mut req = new_req(iface_name)?;
    let fd = new_socket()?;
    let bytes = unsafe {
        if ioctl::siocgifhwaddr(fd.as_raw_fd(), &mut req) < 0 {
            return Err(io_error_context(iface_name, "SIOCGIFHWADDR"));
        }
        let sa_data = &req.ifr_ifru.ifru_hwaddr.sa_data;
        std::array::from_fn::<u8, 6, _>(|index| sa_data[index] as u8)
    };
    Ok(MacAddr::from_bytes(bytes))
}

/// Adds an entry to the routing table of the calling thread's network namespace. With no
/// `iface_name` the kernel picks the interface the gateway is reachable through.
#[cfg_attr(feature="cargo-clippy", allow(clippy::unnecessary_cast))]
pub(crate) fn add_ipv4_route(
    iface_name: Option<&str>,
    destination: Ipv4Network,
    gateway_opt: Option<Ipv4Addr>,
) -> io::Result<()> {
    let fd = new_socket()?;

    let mut route: libc::rtentry = unsafe {
        mem::zeroed()
    };

    unsafe {
        write_sockaddr_in(&mut route.rt_dst, destination.base_addr());
        write_sockaddr_in(&mut route.rt_genmask, destination.netmask());
    }

    route.rt_flags = libc::RTF_UP as u16;
    if let Some(gateway_addr) = gateway_opt {
        unsafe {
            write_sockaddr_in(&mut route.rt_gateway, gateway_addr);
        }
        route.rt_flags |= libc::RTF_GATEWAY as u16;
    }
    if destination.subnet_mask_bits() == 32 {
        route.rt_flags |= libc::RTF_HOST as u16;
    }

    let c_iface_name_opt = match iface_name {
        Some(iface_name) => match CString::new(iface_name) {
            Ok(c_iface_name) => Some(c_iface_name),
            Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidInput, err)),
        },
        None => None,
    };
    // The kernel only reads through rt_dev.
    route.rt_dev = match &c_iface_name_opt {
        Some(c_iface_name) => c_iface_name.as_ptr() as *mut _,
        None => ptr::null_mut(),
    };

    let res = unsafe {
        ioctl::siocaddrt(fd.as_raw_fd(), &route)
    };
    if res < 0 {
        let err = io::Error::last_os_error();
        let gateway = match gateway_opt {
            Some(gateway_addr) => format!(" via {}", gateway_addr),
            None => String::new(),
        };
        let msg = format!("adding route to {}{}: {}", destination, gateway, err);
        return Err(io::Error::new(err.kind(), msg));
    }

    Ok(())
}

#[cfg_attr(feature="cargo-clippy", allow(clippy::cast_ptr_alignment))]
unsafe fn write_sockaddr_in(sockaddr: &mut libc::sockaddr, ipv4_addr: Ipv4Addr) {
    let sockaddr = sockaddr as *mut libc::sockaddr as *mut libc::sockaddr_in;
    let sockaddr = &mut *sockaddr;
    sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
    sockaddr.sin_port = 0;
    sockaddr.sin_addr = libc::in_addr { s_addr: u32::from(ipv4_addr).to_be() };
}

fn io_error_context(iface_name: &str, request: &str) -> io::Error {
    let err = io::Error::last_os_error();
    io::Error::new(err.kind(), format!("calling ioctl({}) on {}: {}", request, iface_name, err))
}

fn new_req(iface_name: &str) -> io::Result<libc::ifreq> {
    if iface_name.len() >= libc::IF_NAMESIZE {
        let msg = format!("interface name {:?} is too long", iface_name);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
    }
    unsafe {
        let mut req: libc::ifreq = mem::zeroed();
        ptr::copy_nonoverlapping(
            iface_name.as_ptr(),
            req.ifr_name.as_mut_ptr() as *mut u8,
            iface_name.as_bytes().len(),
        );
        Ok(req)
    }
}

#[cfg_attr(feature="cargo-clippy", allow(clippy::unnecessary_cast))]
fn new_socket() -> io::Result<OwnedFd> {
    let raw_fd = unsafe {
        libc::socket(libc::AF_INET as i32, (libc::SOCK_DGRAM | libc::SOCK_CLOEXEC) as i32, 0)
    };
    if raw_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };
    Ok(fd)
}
