//! The interactive command loop.

use crate::priv_prelude::*;
use crate::net::Network;
use crate::topology::NodeKind;
use tokio::io::AsyncBufReadExt;

const PROMPT: &str = "routelab> ";

const HELP: &str = "\
Documented commands:
  help               show this message
  nodes              list the nodes and switches
  net                list each node's links
  dump               show each node's interfaces and addresses
  pingall            ping between every pair of nodes
  ping <src> <dst>   ping <dst> from <src>
  route <node>       show the routing table of <node>
  exit, quit         leave the command loop
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Nodes,
    Net,
    Dump,
    PingAll,
    Ping { source: String, destination: String },
    Route { node: String },
    Exit,
}

quick_error! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ParseCommandError {
        Empty {
            display("empty command")
        }
        Unknown(command: String) {
            display("unknown command: {}", command)
        }
        Usage(usage: &'static str) {
            display("usage: {}", usage)
        }
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Command, ParseCommandError> {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => return Err(ParseCommandError::Empty),
        };
        let args: Vec<&str> = words.collect();
        let command = match (command, &args[..]) {
            ("help" | "?", []) => Command::Help,
            ("nodes", []) => Command::Nodes,
            ("net", []) => Command::Net,
            ("dump", []) => Command::Dump,
            ("pingall", []) => Command::PingAll,
            ("ping", [source, destination]) => Command::Ping {
                source: (*source).to_owned(),
                destination: (*destination).to_owned(),
            },
            ("ping", _) => return Err(ParseCommandError::Usage("ping <src> <dst>")),
            ("route", [node]) => Command::Route { node: (*node).to_owned() },
            ("route", _) => return Err(ParseCommandError::Usage("route <node>")),
            ("exit" | "quit", []) => Command::Exit,
            ("help" | "?" | "nodes" | "net" | "dump" | "pingall" | "exit" | "quit", _) => {
                return Err(ParseCommandError::Usage(command_usage(command)));
            },
            (other, _) => return Err(ParseCommandError::Unknown(other.to_owned())),
        };
        Ok(command)
    }
}

fn command_usage(command: &str) -> &'static str {
    match command {
        "help" | "?" => "help",
        "nodes" => "nodes",
        "net" => "net",
        "dump" => "dump",
        "pingall" => "pingall",
        _ => "exit",
    }
}

/// Lists the nodes then the switches, the way `nodes` prints them.
pub fn format_nodes(network: &Network) -> String {
    let mut names: Vec<&str> = network.nodes().iter().map(|node| node.name()).collect();
    names.sort();
    names.extend(network.switch_names());
    format!("available nodes are: \n{}\n", names.join(" "))
}

/// One line per node naming each interface and the switch it's plugged into, followed by one line
/// per switch naming the interfaces plugged into it.
pub fn format_net(network: &Network) -> String {
    let mut text = String::new();
    for node in network.nodes() {
        text.push_str(node.name());
        for iface in node.ifaces() {
            text.push_str(&format!(" {}:{}", iface.name, iface.switch));
        }
        text.push('\n');
    }
    for switch in network.switch_names() {
        text.push_str(switch);
        for node in network.nodes() {
            for iface in node.ifaces().iter().filter(|iface| iface.switch == switch) {
                text.push_str(&format!(" {}:{}", node.name(), iface.name));
            }
        }
        text.push('\n');
    }
    text
}

pub fn format_dump(network: &Network) -> String {
    let mut text = String::new();
    for node in network.nodes() {
        let kind = match node.kind() {
            NodeKind::Host => "Host",
            NodeKind::Router => "Router",
        };
        let ifaces: Vec<String> = {
            node
            .ifaces()
            .iter()
            .map(|iface| match iface.ipv4_opt {
                Some(ipv4) => format!("{}:{}", iface.name, ipv4),
                None => format!("{}:None", iface.name),
            })
            .collect()
        };
        text.push_str(&format!("<{} {}: {}>\n", kind, node.name(), ifaces.join(",")));
    }
    text
}

async fn execute(network: &Network, command: Command, ping_timeout: Duration) -> Result<(), NetworkError> {
    match command {
        Command::Help => print!("{}", HELP),
        Command::Nodes => print!("{}", format_nodes(network)),
        Command::Net => print!("{}", format_net(network)),
        Command::Dump => print!("{}", format_dump(network)),
        Command::PingAll => {
            println!("*** Ping: testing ping reachability");
            let report = network.ping_all(ping_timeout).await?;
            print!("{}", report);
        },
        Command::Ping { source, destination } => {
            match network.ping(&source, &destination, ping_timeout).await? {
                Some(rtt) => {
                    println!("{} -> {}: reply in {:.3} ms", source, destination, rtt.as_secs_f64() * 1000.0);
                },
                None => println!("{} -> {}: no reply", source, destination),
            }
        },
        Command::Route { node } => {
            let table = network.routing_table(&node).await?;
            print!("{}", table);
        },
        Command::Exit => (),
    }
    Ok(())
}

fn show_prompt() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(PROMPT.as_bytes());
    let _ = stdout.flush();
}

/// Reads commands from stdin and runs them against `network` until `exit`, `quit` or end of
/// input. Errors from a command are printed and the loop carries on. Only a failure to read stdin
/// ends the loop with an error.
pub async fn run(network: &Network, ping_timeout: Duration) -> Result<(), NetworkError> {
    info!("*** Starting CLI:");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        show_prompt();
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => {
                println!();
                break;
            },
        };
        let command = match Command::from_str(&line) {
            Ok(command) => command,
            Err(ParseCommandError::Empty) => continue,
            Err(err) => {
                println!("*** {}", err);
                continue;
            },
        };
        if command == Command::Exit {
            break;
        }
        if let Err(err) = execute(network, command, ping_timeout).await {
            println!("*** Error: {}", err);
        }
    }
    Ok(())
}
