use anyhow::{Context, Result};
use clap::Parser;
use routelab::LabConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "routelab",
    author,
    version,
    about = "Three routers, six switches and six hosts in Linux network namespaces, joined by static routes",
)]
struct Cli {
    /// Node whose interfaces are captured
    #[arg(long = "capture-node", default_value = "R1")]
    capture_node: String,
    /// File the packet capture is written to
    #[arg(long = "capture-path", default_value = "R1.pcap")]
    capture_path: PathBuf,
    /// Seconds to wait after starting the capture before pinging
    #[arg(long = "settle-secs", default_value = "5")]
    settle_secs: u64,
    /// How long each ping waits for a reply, in milliseconds
    #[arg(long = "ping-timeout-ms", default_value = "1000")]
    ping_timeout_ms: u64,
    /// Exit after printing the routing tables instead of starting the command loop
    #[arg(long = "no-cli")]
    no_cli: bool,
}

impl Cli {
    fn into_config(self) -> LabConfig {
        LabConfig {
            capture_node: self.capture_node,
            capture_path: self.capture_path,
            settle_time: Duration::from_secs(self.settle_secs),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            interactive: !self.no_cli,
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let config = Cli::parse().into_config();
    log::debug!("running lab with {:?}", config);

    routelab::lab::run(&config)
        .await
        .context("running the three-router lab")?;
    Ok(())
}
