use crate::priv_prelude::*;

/// Options for [`lab::run`](crate::lab::run).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabConfig {
    /// Node whose interfaces are captured.
    pub capture_node: String,
    /// Where the pcap file is written.
    pub capture_path: PathBuf,
    /// How long to wait between starting the capture and pinging.
    pub settle_time: Duration,
    /// How long each ping waits for its reply.
    pub ping_timeout: Duration,
    /// Whether to hand over to the interactive command loop before shutting down.
    pub interactive: bool,
}

impl Default for LabConfig {
    fn default() -> LabConfig {
        LabConfig {
            capture_node: String::from("R1"),
            capture_path: PathBuf::from("R1.pcap"),
            settle_time: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(1),
            interactive: true,
        }
    }
}
