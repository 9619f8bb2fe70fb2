use crate::priv_prelude::*;

/// An in-memory, two-way link carrying ethernet frames. One end can be plugged into an
/// [`EtherSwitch`](crate::EtherSwitch) while the other end is driven by hand, which is how the
/// switch gets exercised without any namespaces.
pub struct EtherChannel {
    sender: mpsc::Sender<EtherFrame>,
    receiver: mpsc::Receiver<EtherFrame>,
}

impl EtherChannel {
    /// Creates a connected pair of `EtherChannel`s. Frames sent on one will be received on the
    /// other. Each direction buffers up to `capacity` frames.
    pub fn new(capacity: usize) -> (EtherChannel, EtherChannel) {
        let (sender_0, receiver_0) = mpsc::channel(capacity);
        let (sender_1, receiver_1) = mpsc::channel(capacity);
        let channel_0 = EtherChannel {
            sender: sender_0,
            receiver: receiver_1,
        };
        let channel_1 = EtherChannel {
            sender: sender_1,
            receiver: receiver_0,
        };
        (channel_0, channel_1)
    }
}

impl Stream for EtherChannel {
    type Item = io::Result<EtherFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<Option<io::Result<EtherFrame>>> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver).poll_next(cx).map(|frame_opt| frame_opt.map(Ok))
    }
}

impl Sink<EtherFrame> for EtherChannel {
    type Error = io::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.sender).poll_ready(cx).map_err(as_io_error)
    }

    fn start_send(self: Pin<&mut Self>, frame: EtherFrame) -> io::Result<()> {
        let this = self.get_mut();
        Pin::new(&mut this.sender).start_send(frame).map_err(as_io_error)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.sender).poll_flush(cx).map_err(as_io_error)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.sender).poll_close(cx).map_err(as_io_error)
    }
}

impl FusedStream for EtherChannel {
    fn is_terminated(&self) -> bool {
        self.receiver.is_terminated()
    }
}

fn as_io_error(err: mpsc::SendError) -> io::Error {
    let kind = if err.is_disconnected() {
        io::ErrorKind::NotConnected
    } else if err.is_full() {
        io::ErrorKind::WouldBlock
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}
