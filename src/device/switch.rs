use crate::priv_prelude::*;

/// A learning ethernet switch.
///
/// The switch remembers which port each source MAC address was last seen on. Frames for a known
/// unicast address go out that port only. Broadcast, multicast and unknown unicast frames are
/// flooded to every port except the one they came in on.
pub struct EtherSwitch {
    name: String,
    port_sender: mpsc::UnboundedSender<Pin<Box<dyn EtherSinkStream>>>,
}

struct EtherSwitchTask {
    name: String,
    port_receiver: mpsc::UnboundedReceiver<Pin<Box<dyn EtherSinkStream>>>,
    ports: BTreeMap<usize, Pin<Box<dyn EtherSinkStream>>>,
    next_port_index: usize,
    poll_cursor: usize,
    mac_table: HashMap<MacAddr, usize>,
}

impl EtherSwitch {
    /// Create a new `EtherSwitch`. Must be called within a `tokio` context. The switch keeps
    /// running until the `EtherSwitch` is dropped.
    pub fn new(name: impl Into<String>) -> EtherSwitch {
        let name = name.into();
        let (port_sender, port_receiver) = mpsc::unbounded();
        let task = EtherSwitchTask {
            name: name.clone(),
            port_receiver,
            ports: BTreeMap::new(),
            next_port_index: 0,
            poll_cursor: 0,
            mac_table: HashMap::new(),
        };
        tokio::spawn(task);
        EtherSwitch { name, port_sender }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plug a `Sink`/`Stream` of ethernet frames into a new port of the switch.
    pub fn insert_port<S>(&mut self, port: S)
    where
        S: EtherSinkStream,
    {
        let port = Box::pin(port);
        if self.port_sender.unbounded_send(port).is_err() {
            warn!("switch {} has stopped, port was not connected", self.name);
        }
    }
}

impl EtherSwitchTask {
    fn remove_port(&mut self, index: usize) {
        if self.ports.remove(&index).is_some() {
            debug!("{}: port {} disconnected", self.name, index);
        }
        self.mac_table.retain(|_, port_index| *port_index != index);
    }

    fn poll_ready_outgoing(&mut self, cx: &mut task::Context) -> Poll<()> {
        let mut any_pending = false;
        let mut disconnected = Vec::new();
        for (index, port) in self.ports.iter_mut() {
            match port.as_mut().poll_ready(cx) {
                Poll::Ready(Ok(())) => (),
                Poll::Ready(Err(err)) => {
                    debug!("{}: error sending on port {}: {}", self.name, index, err);
                    disconnected.push(*index);
                },
                Poll::Pending => {
                    any_pending = true;
                },
            }
        }
        for index in disconnected {
            self.remove_port(index);
        }
        if any_pending {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }

    /// Polls the ports round-robin so that a busy port can't starve the others.
    fn poll_next_incoming(&mut self, cx: &mut task::Context) -> Poll<(usize, EtherFrame)> {
        let indices: Vec<usize> = self.ports.keys().copied().collect();
        let num_ports = indices.len();
        for offset in 0..num_ports {
            let index = indices[(self.poll_cursor + offset) % num_ports];
            let port = match self.ports.get_mut(&index) {
                Some(port) => port,
                None => continue,
            };
            match port.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    self.poll_cursor = (self.poll_cursor + offset + 1) % num_ports;
                    return Poll::Ready((index, frame));
                },
                Poll::Ready(Some(Err(err))) => {
                    debug!("{}: error receiving on port {}: {}", self.name, index, err);
                    self.remove_port(index);
                },
                Poll::Ready(None) => {
                    self.remove_port(index);
                },
                Poll::Pending => (),
            }
        }
        Poll::Pending
    }

    fn send_to(&mut self, index: usize, frame: EtherFrame) {
        let port = match self.ports.get_mut(&index) {
            Some(port) => port,
            None => return,
        };
        if let Err(err) = port.as_mut().start_send(frame) {
            debug!("{}: error sending on port {}: {}", self.name, index, err);
            self.remove_port(index);
        }
    }

    fn forward(&mut self, ingress_index: usize, frame: EtherFrame) {
        let source_mac = frame.source_mac();
        if !source_mac.is_multicast() {
            match self.mac_table.insert(source_mac, ingress_index) {
                Some(prev_index) if prev_index == ingress_index => (),
                Some(prev_index) => {
                    debug!("{}: {} moved from port {} to port {}", self.name, source_mac, prev_index, ingress_index);
                },
                None => {
                    trace!("{}: learned {} on port {}", self.name, source_mac, ingress_index);
                },
            }
        }

        let destination_mac = frame.destination_mac();
        let egress_index_opt = if destination_mac.is_multicast() {
            None
        } else {
            self.mac_table.get(&destination_mac).copied()
        };
        match egress_index_opt {
            Some(egress_index) if egress_index == ingress_index => {
                trace!("{}: filtering frame for {} on its own port", self.name, destination_mac);
            },
            Some(egress_index) => {
                self.send_to(egress_index, frame);
            },
            None => {
                let egress_indices: Vec<usize> = {
                    self.ports
                    .keys()
                    .copied()
                    .filter(|index| *index != ingress_index)
                    .collect()
                };
                for egress_index in egress_indices {
                    self.send_to(egress_index, frame.clone());
                }
            },
        }
    }

    fn poll_inner(&mut self, cx: &mut task::Context) -> Poll<()> {
        loop {
            match Pin::new(&mut self.port_receiver).poll_next(cx) {
                Poll::Ready(Some(port)) => {
                    let index = self.next_port_index;
                    self.next_port_index += 1;
                    debug!("{}: port {} connected", self.name, index);
                    self.ports.insert(index, port);
                },
                Poll::Ready(None) => {
                    debug!("{}: shutting down", self.name);
                    return Poll::Ready(());
                },
                Poll::Pending => break,
            }
        }

        loop {
            ready!(self.poll_ready_outgoing(cx));
            let (ingress_index, frame) = ready!(self.poll_next_incoming(cx));

            if log_enabled!(Level::Trace) {
                trace!("{}: received on port {} {:?}", self.name, ingress_index, frame);
            }

            self.forward(ingress_index, frame);
        }
    }
}

impl Future for EtherSwitchTask {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<()> {
        let this = self.get_mut();
        this.poll_inner(cx)
    }
}
