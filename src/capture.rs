//! Packet capture to pcap files.

use crate::priv_prelude::*;

const MAGIC: u32 = 0xa1b2_3c4d;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;
const SNAPLEN: u32 = 65_535;
const LINKTYPE_ETHERNET: u32 = 1;

/// The pcap file header. Timestamps in the file have nanosecond resolution.
pub fn global_header() -> [u8; 24] {
    let mut header = [0u8; 24];
    header[0..4].copy_from_slice(&MAGIC.to_ne_bytes());
    header[4..6].copy_from_slice(&VERSION_MAJOR.to_ne_bytes());
    header[6..8].copy_from_slice(&VERSION_MINOR.to_ne_bytes());
    header[8..12].copy_from_slice(&0i32.to_ne_bytes());
    header[12..16].copy_from_slice(&0u32.to_ne_bytes());
    header[16..20].copy_from_slice(&SNAPLEN.to_ne_bytes());
    header[20..24].copy_from_slice(&LINKTYPE_ETHERNET.to_ne_bytes());
    header
}

/// The header preceding each captured frame.
pub fn record_header(timestamp: SystemTime, len: usize) -> [u8; 16] {
    let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let len = len as u32;
    let captured_len = cmp::min(len, SNAPLEN);
    let mut header = [0u8; 16];
    header[0..4].copy_from_slice(&(since_epoch.as_secs() as u32).to_ne_bytes());
    header[4..8].copy_from_slice(&since_epoch.subsec_nanos().to_ne_bytes());
    header[8..12].copy_from_slice(&captured_len.to_ne_bytes());
    header[12..16].copy_from_slice(&len.to_ne_bytes());
    header
}

/// Writes ethernet frames in pcap format.
pub struct PcapWriter<W> {
    writer: W,
}

impl<W> PcapWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Writes the pcap file header to `writer`.
    pub async fn new(mut writer: W) -> io::Result<PcapWriter<W>> {
        writer.write_all(&global_header()).await?;
        Ok(PcapWriter { writer })
    }

    pub async fn write_frame(&mut self, timestamp: SystemTime, frame: &[u8]) -> io::Result<()> {
        let captured_len = cmp::min(frame.len(), SNAPLEN as usize);
        self.writer.write_all(&record_header(timestamp, frame.len())).await?;
        self.writer.write_all(&frame[..captured_len]).await?;
        Ok(())
    }

    pub async fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush().await?;
        Ok(self.writer)
    }
}

/// A frame seen at a tap point, with the time it was seen.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub timestamp: SystemTime,
    pub frame: EtherFrame,
}

/// A running capture writing to a pcap file.
///
/// The capture receives the frames of every tap point it is attached to (see
/// [`Network::capture`](crate::Network::capture)) and keeps writing until
/// [`finish`](crate::PacketCapture::finish) is called.
pub struct PacketCapture {
    path: PathBuf,
    frame_tx: mpsc::UnboundedSender<CapturedFrame>,
    writer_task: tokio::task::JoinHandle<io::Result<u64>>,
}

impl PacketCapture {
    /// Creates (or truncates) the file at `path` and starts writing frames to it. Must be called
    /// within a `tokio` context.
    pub async fn create(path: impl AsRef<Path>) -> io::Result<PacketCapture> {
        let path = path.as_ref().to_owned();
        let file = match tokio::fs::File::create(&path).await {
            Ok(file) => file,
            Err(err) => {
                let msg = format!("creating capture file {}: {}", path.display(), err);
                return Err(io::Error::new(err.kind(), msg));
            },
        };
        let writer = PcapWriter::new(tokio::io::BufWriter::new(file)).await?;
        let (frame_tx, frame_rx) = mpsc::unbounded();
        let writer_task = tokio::spawn(write_frames(writer, frame_rx));
        info!("capturing to {}", path.display());
        Ok(PacketCapture { path, frame_tx, writer_task })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn frame_sender(&self) -> mpsc::UnboundedSender<CapturedFrame> {
        self.frame_tx.clone()
    }

    /// Stops capturing, flushes the file and returns how many frames were written.
    pub async fn finish(self) -> io::Result<u64> {
        let PacketCapture { path, frame_tx, writer_task } = self;
        frame_tx.close_channel();
        let num_frames = match writer_task.await {
            Ok(res) => res?,
            Err(join_err) => {
                if join_err.is_panic() {
                    panic::resume_unwind(join_err.into_panic());
                }
                let msg = format!("capture to {} was cancelled", path.display());
                return Err(io::Error::new(io::ErrorKind::Interrupted, msg));
            },
        };
        info!("wrote {} frames to {}", num_frames, path.display());
        Ok(num_frames)
    }
}

async fn write_frames<W>(
    mut writer: PcapWriter<W>,
    mut frame_rx: mpsc::UnboundedReceiver<CapturedFrame>,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut num_frames = 0;
    while let Some(CapturedFrame { timestamp, frame }) = frame_rx.next().await {
        writer.write_frame(timestamp, frame.as_bytes()).await?;
        num_frames += 1;
    }
    writer.into_inner().await?;
    Ok(num_frames)
}

/// Fans out the frames crossing a node's interfaces to every capture attached to the node.
#[derive(Clone, Default)]
pub struct TapPoint {
    frame_txs: Arc<Mutex<Vec<mpsc::UnboundedSender<CapturedFrame>>>>,
}

impl TapPoint {
    pub fn new() -> TapPoint {
        TapPoint::default()
    }

    pub fn attach(&self, capture: &PacketCapture) {
        let mut frame_txs = self.frame_txs.lock().unwrap_or_else(PoisonError::into_inner);
        frame_txs.push(capture.frame_sender());
    }

    fn record(&self, frame: &EtherFrame) {
        let mut frame_txs = self.frame_txs.lock().unwrap_or_else(PoisonError::into_inner);
        if frame_txs.is_empty() {
            return;
        }
        let timestamp = SystemTime::now();
        frame_txs.retain(|frame_tx| {
            let captured = CapturedFrame { timestamp, frame: frame.clone() };
            frame_tx.unbounded_send(captured).is_ok()
        });
    }
}

/// Wraps an ethernet `Sink`/`Stream`, reporting every frame that passes through it, in either
/// direction, to a [`TapPoint`](crate::TapPoint).
#[pin_project]
pub struct Tapped<S> {
    #[pin]
    inner: S,
    tap_point: TapPoint,
}

impl<S> Tapped<S> {
    pub fn new(inner: S, tap_point: TapPoint) -> Tapped<S> {
        Tapped { inner, tap_point }
    }
}

impl<S> Stream for Tapped<S>
where
    S: Stream<Item = io::Result<EtherFrame>>,
{
    type Item = io::Result<EtherFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<Option<io::Result<EtherFrame>>> {
        let this = self.project();
        let res_opt = ready!(this.inner.poll_next(cx));
        if let Some(Ok(frame)) = &res_opt {
            this.tap_point.record(frame);
        }
        Poll::Ready(res_opt)
    }
}

impl<S> Sink<EtherFrame> for Tapped<S>
where
    S: Sink<EtherFrame, Error = io::Error>,
{
    type Error = io::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut task::Context) -> Poll<io::Result<()>> {
        let this = self.project();
        this.inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, frame: EtherFrame) -> io::Result<()> {
        let this = self.project();
        this.tap_point.record(&frame);
        this.inner.start_send(frame)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
        let this = self.project();
        this.inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<io::Result<()>> {
        let this = self.project();
        this.inner.poll_close(cx)
    }
}
