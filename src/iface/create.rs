use crate::priv_prelude::*;

struct BuildConfig {
    name_opt: Option<String>,
    ipv4_addr_opt: Option<Ipv4IfaceAddr>,
}

/// Configures a virtual ethernet interface before creating it on a
/// [`Machine`](crate::Machine). Await the builder to create the interface.
///
/// ```rust,ignore
/// let iface = {
///     machine
///     .add_ether_iface()
///     .name("H1-eth0")
///     .ipv4_addr(ipv4_iface_addr!("10.0.1.2/24"))
///     .await?
/// };
/// ```
pub struct EtherIfaceBuilder<'m> {
    machine: &'m Machine,
    build_config: BuildConfig,
}

impl EtherIfaceBuilder<'_> {
    pub(crate) fn new(machine: &Machine) -> EtherIfaceBuilder<'_> {
        EtherIfaceBuilder {
            machine,
            build_config: BuildConfig {
                name_opt: None,
                ipv4_addr_opt: None,
            },
        }
    }

    /// Sets the interface name. Defaults to `eth%d`, which the kernel expands to the first free
    /// `eth` name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.build_config.name_opt = Some(name.into());
        self
    }

    /// Sets the interface's IPv4 address and subnet. The kernel adds a route to the subnet
    /// through the interface.
    pub fn ipv4_addr(mut self, ipv4_addr: Ipv4IfaceAddr) -> Self {
        self.build_config.ipv4_addr_opt = Some(ipv4_addr);
        self
    }
}

impl<'m> IntoFuture for EtherIfaceBuilder<'m> {
    type Output = io::Result<EtherIface>;
    type IntoFuture = Pin<Box<dyn Future<Output = io::Result<EtherIface>> + Send + 'm>>;

    fn into_future(self) -> Pin<Box<dyn Future<Output = io::Result<EtherIface>> + Send + 'm>> {
        let EtherIfaceBuilder { machine, build_config } = self;
        Box::pin(async move {
            let task = async move {
                create_tap_interface(build_config)
            };
            let (fd, name, mac_addr) = machine.run(task).await??;
            debug!("{}: created interface {} ({})", machine.name(), name, mac_addr);
            EtherIface::new(fd, name, mac_addr)
        })
    }
}

fn create_tap_interface(build_config: BuildConfig) -> io::Result<(OwnedFd, String, MacAddr)> {
    let BuildConfig { name_opt, ipv4_addr_opt } = build_config;
    let name = name_opt.as_deref().unwrap_or("eth%d");
    let name_cstr = match CString::new(name) {
        Ok(name_cstr) => name_cstr,
        Err(err) => {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, err));
        },
    };
    if name_cstr.as_bytes_with_nul().len() > libc::IF_NAMESIZE {
        let msg = format!("interface name {:?} is too long", name);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
    }

    let fd = {
        let raw_fd = unsafe {
            libc::open(b"/dev/net/tun\0".as_ptr() as *const _, libc::O_RDWR | libc::O_CLOEXEC)
        };
        if raw_fd < 0 {
            let err = io::Error::last_os_error();
            return Err(io::Error::new(err.kind(), format!("opening /dev/net/tun: {}", err)));
        }
        unsafe {
            OwnedFd::from_raw_fd(raw_fd)
        }
    };
    let flags = unsafe {
        libc::fcntl(fd.as_raw_fd(), libc::F_GETFL, 0)
    };
    if flags < 0 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), "calling fcntl(F_GETFL) on /dev/net/tun"));
    }
    let res = unsafe {
        libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK)
    };
    if res < 0 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), "calling fcntl(F_SETFL) on /dev/net/tun"));
    }
    let mut req = unsafe {
        let mut req: libc::ifreq = mem::zeroed();
        ptr::copy_nonoverlapping(
            name_cstr.as_ptr(),
            req.ifr_name.as_mut_ptr(),
            name_cstr.as_bytes().len(),
        );
        req.ifr_ifru.ifru_flags = libc::IFF_NO_PI as i16;
        req.ifr_ifru.ifru_flags |= libc::IFF_TAP as i16;
        req
    };
    let res = unsafe {
        ioctl::tunsetiff(fd.as_raw_fd(), &mut req as *mut _ as *mut _)
    };
    if res < 0 {
        let err = io::Error::last_os_error();
        return Err(io::Error::new(err.kind(), format!("calling ioctl(TUNSETIFF) for {:?}: {}", name, err)));
    };
    let real_name = {
        let name = &req.ifr_name[..];
        let name = match name.iter().position(|b| *b == 0) {
            Some(p) => &name[..p],
            None => name,
        };
        let name = unsafe {
            slice::from_raw_parts(name.as_ptr() as *const u8, name.len())
        };
        match std::str::from_utf8(name) {
            Ok(name) => name.to_owned(),
            Err(err) => {
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            },
        }
    };

    if let Some(ipv4_addr) = ipv4_addr_opt {
        iface::configure::set_ipv4_addr(&real_name, ipv4_addr.addr(), ipv4_addr.subnet_mask_bits())?;
    }

    iface::configure::put_up(&real_name)?;
    let mac_addr = iface::configure::get_mac_addr(&real_name)?;

    Ok((fd, real_name, mac_addr))
}
