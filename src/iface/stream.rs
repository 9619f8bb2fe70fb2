use crate::priv_prelude::*;

const MAX_FRAME_LEN: usize = libc::ETH_FRAME_LEN as usize;

/// A virtual ethernet (TAP) interface living on a [`Machine`](crate::Machine).
///
/// The `Stream` side yields the frames the machine sends out the interface. Frames fed into the
/// `Sink` side arrive at the machine as if they came in off the wire.
pub struct EtherIface {
    fd: AsyncFd<OwnedFd>,
    name: String,
    mac_addr: MacAddr,
    send_frame_opt: Option<EtherFrame>,
}

impl EtherIface {
    pub(crate) fn new(fd: OwnedFd, name: String, mac_addr: MacAddr) -> io::Result<EtherIface> {
        let fd = AsyncFd::new(fd)?;
        let iface = EtherIface {
            fd,
            name,
            mac_addr,
            send_frame_opt: None,
        };
        Ok(iface)
    }

    /// The interface name as seen inside the machine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The interface's hardware address.
    pub fn mac_addr(&self) -> MacAddr {
        self.mac_addr
    }
}

impl fmt::Debug for EtherIface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EtherIface")
        .field("name", &self.name)
        .field("mac_addr", &self.mac_addr)
        .finish()
    }
}

impl Sink<EtherFrame> for EtherIface {
    type Error = io::Error;

    fn poll_ready(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<io::Result<()>> {
        Self::poll_flush(self, cx)
    }

    fn start_send(self: Pin<&mut Self>, item: EtherFrame) -> io::Result<()> {
        let this = self.get_mut();
        let send_frame_opt = this.send_frame_opt.replace(item);
        debug_assert!(send_frame_opt.is_none());
        Ok(())
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let frame = match this.send_frame_opt.take() {
            Some(frame) => frame,
            None => return Poll::Ready(Ok(())),
        };
        if frame.len() > MAX_FRAME_LEN {
            trace!("{}: dropping oversized frame ({} bytes)", this.name, frame.len());
            return Poll::Ready(Ok(()));
        }
        loop {
            let mut guard = match this.fd.poll_write_ready(cx) {
                Poll::Ready(res) => res?,
                Poll::Pending => {
                    this.send_frame_opt = Some(frame);
                    return Poll::Pending;
                },
            };
            match guard.try_io(|fd| {
                let bytes = frame.as_bytes();
                let res = unsafe {
                    libc::write(
                        fd.as_raw_fd(),
                        bytes.as_ptr() as *const libc::c_void,
                        bytes.len(),
                    )
                };
                if res < 0 {
                    let err = io::Error::last_os_error();
                    return Err(err);
                }
                Ok(res as usize)
            }) {
                Ok(Ok(n)) => {
                    debug_assert_eq!(n, frame.len());
                    return Poll::Ready(Ok(()));
                },
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_close(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<io::Result<()>> {
        Self::poll_flush(self, cx)
    }
}

impl Stream for EtherIface {
    type Item = io::Result<EtherFrame>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Option<io::Result<EtherFrame>>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.fd.poll_read_ready(cx))?;
            let mut buffer = [0u8; MAX_FRAME_LEN];
            match guard.try_io(|fd| {
                let res = unsafe {
                    libc::read(
                        fd.as_raw_fd(),
                        buffer.as_mut_slice().as_mut_ptr() as *mut libc::c_void,
                        buffer.len(),
                    )
                };
                if res < 0 {
                    let err = io::Error::last_os_error();
                    return Err(err);
                }
                Ok(res as usize)
            }) {
                Ok(Ok(0)) => return Poll::Ready(None),
                Ok(Ok(n)) => {
                    let data = Bytes::copy_from_slice(&buffer[..n]);
                    match EtherFrame::from_bytes(data) {
                        Some(frame) => return Poll::Ready(Some(Ok(frame))),
                        None => {
                            trace!("{}: skipping runt frame ({} bytes)", this.name, n);
                            continue;
                        },
                    }
                },
                Ok(Err(err)) => return Poll::Ready(Some(Err(err))),
                Err(_would_block) => continue,
            }
        }
    }
}
