use crate::priv_prelude::*;
use crate::icmp::{self, EchoReply};

const PAYLOAD: &[u8] = b"routelab echo payload 0123456789";
const RECV_BUFFER_LEN: usize = 1500;

/// The machine has no route to the destination, or the neighbour never answered ARP.
fn is_unreachable(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENETUNREACH) | Some(libc::EHOSTUNREACH))
}

/// An ICMP echo client using a raw socket.
///
/// Raw sockets belong to the network namespace they are created in, so a `Pinger` must be created
/// and used by a future running on a [`Machine`](crate::Machine).
pub struct Pinger {
    fd: AsyncFd<OwnedFd>,
    id: u16,
    next_seq: u16,
}

impl Pinger {
    pub fn new() -> io::Result<Pinger> {
        let raw_fd = unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::IPPROTO_ICMP,
            )
        };
        if raw_fd < 0 {
            let err = io::Error::last_os_error();
            return Err(io::Error::new(err.kind(), format!("creating raw ICMP socket: {}", err)));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };
        let fd = AsyncFd::new(fd)?;
        Ok(Pinger {
            fd,
            id: rand::random(),
            next_seq: 1,
        })
    }

    /// Sends one echo request to `destination` and waits up to `timeout` for the reply. Returns
    /// the round-trip time, or `None` if no reply arrived in time or there is no route to
    /// `destination`.
    pub async fn ping(&mut self, destination: Ipv4Addr, timeout: Duration) -> io::Result<Option<Duration>> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let request = icmp::echo_request(self.id, seq, PAYLOAD);
        let start = Instant::now();
        match self.send_to(&request, destination).await {
            Ok(()) => (),
            Err(err) if is_unreachable(&err) => {
                trace!("echo request {}/{} to {} not sent: {}", self.id, seq, destination, err);
                return Ok(None);
            },
            Err(err) => return Err(err),
        }
        trace!("sent echo request {}/{} to {}", self.id, seq, destination);

        match tokio::time::timeout(timeout, self.recv_reply(destination, seq)).await {
            Ok(res) => {
                res?;
                Ok(Some(start.elapsed()))
            },
            Err(_elapsed) => {
                trace!("echo request {}/{} to {} timed out", self.id, seq, destination);
                Ok(None)
            },
        }
    }

    async fn send_to(&self, message: &[u8], destination: Ipv4Addr) -> io::Result<()> {
        let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_addr = libc::in_addr { s_addr: u32::from(destination).to_be() };
        loop {
            let mut guard = self.fd.writable().await?;
            let res = guard.try_io(|fd| {
                let res = unsafe {
                    libc::sendto(
                        fd.as_raw_fd(),
                        message.as_ptr() as *const c_void,
                        message.len(),
                        0,
                        &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                        mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                    )
                };
                if res < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
            match res {
                Ok(res) => return res,
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv_reply(&self, destination: Ipv4Addr, seq: u16) -> io::Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_LEN];
        loop {
            let mut guard = self.fd.readable().await?;
            let res = guard.try_io(|fd| {
                let res = unsafe {
                    libc::recv(
                        fd.as_raw_fd(),
                        buffer.as_mut_ptr() as *mut c_void,
                        buffer.len(),
                        0,
                    )
                };
                if res < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(res as usize)
            });
            let len = match res {
                Ok(res) => res?,
                Err(_would_block) => continue,
            };
            match EchoReply::parse(&buffer[..len]) {
                Some(reply) if reply.source == destination && reply.id == self.id && reply.seq == seq => {
                    return Ok(());
                },
                Some(reply) => {
                    trace!("ignoring echo reply {}/{} from {}", reply.id, reply.seq, reply.source);
                },
                None => (),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unreachable_errors() {
        assert!(is_unreachable(&io::Error::from_raw_os_error(libc::ENETUNREACH)));
        assert!(is_unreachable(&io::Error::from_raw_os_error(libc::EHOSTUNREACH)));
        assert!(!is_unreachable(&io::Error::from_raw_os_error(libc::EPERM)));
        assert!(!is_unreachable(&io::Error::new(io::ErrorKind::Other, "other")));
    }
}
