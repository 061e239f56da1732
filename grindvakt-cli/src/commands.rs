use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use grindvakt_config::GrindvaktConfig;
use grindvakt_engine::{control_send, run_service, FilterEngine, Scenario};
use grindvakt_prevention::{Action, ChainId, Command, Rule};
use grindvakt_protocols::ip_protocol;
use grindvakt_telemetry::EventLogger;
use tracing::{info, warn};

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/grindvakt.yaml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Control socket path, overriding the configured one
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the filter engine and its control socket until Ctrl-C
    Serve,
    /// Append a rule to a chain of a running engine
    Add(AddArgs),
    /// Remove every rule from a chain of a running engine
    Flush(FlushArgs),
    /// Replay a YAML scenario against a fresh engine
    Replay(ReplayArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::Add(_) => "add",
            Commands::Flush(_) => "flush",
            Commands::Replay(_) => "replay",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainArg {
    Input,
    Output,
}

impl From<ChainArg> for ChainId {
    fn from(arg: ChainArg) -> Self {
        match arg {
            ChainArg::Input => ChainId::Input,
            ChainArg::Output => ChainId::Output,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoArg {
    Icmp,
    Tcp,
    Udp,
}

impl ProtoArg {
    fn number(self) -> u8 {
        match self {
            ProtoArg::Icmp => ip_protocol::ICMP,
            ProtoArg::Tcp => ip_protocol::TCP,
            ProtoArg::Udp => ip_protocol::UDP,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionArg {
    Accept,
    Drop,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Accept => Action::Accept,
            ActionArg::Drop => Action::Drop,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(value_enum)]
    pub chain: ChainArg,

    /// Match packets from this source address
    #[arg(long)]
    pub src: Option<Ipv4Addr>,

    /// Match packets to this destination address
    #[arg(long)]
    pub dest: Option<Ipv4Addr>,

    #[arg(long, value_enum)]
    pub proto: Option<ProtoArg>,

    /// ICMP type, only checked for ICMP packets
    #[arg(long)]
    pub icmp_type: Option<u8>,

    /// Source port, only checked for TCP and UDP packets
    #[arg(long)]
    pub sport: Option<u16>,

    /// Destination port, only checked for TCP and UDP packets
    #[arg(long)]
    pub dport: Option<u16>,

    #[arg(long, value_enum, default_value = "drop")]
    pub action: ActionArg,
}

impl AddArgs {
    pub fn rule(&self) -> Rule {
        Rule {
            source: self.src,
            destination: self.dest,
            protocol: self.proto.map(ProtoArg::number),
            icmp_type: self.icmp_type,
            source_port: self.sport,
            destination_port: self.dport,
            action: self.action.into(),
        }
    }

    /// Filters that can never be evaluated given the chosen protocol.
    pub fn filter_warnings(&self) -> Vec<String> {
        let Some(proto) = self.proto else {
            return Vec::new();
        };
        let name = ip_protocol::name(proto.number()).unwrap_or("?");

        let mut warnings = Vec::new();
        if self.icmp_type.is_some() && proto != ProtoArg::Icmp {
            warnings.push(format!("--icmp-type is ignored for {name} packets"));
        }
        if !ip_protocol::has_ports(proto.number()) {
            if self.sport.is_some() {
                warnings.push(format!("--sport is ignored for {name} packets"));
            }
            if self.dport.is_some() {
                warnings.push(format!("--dport is ignored for {name} packets"));
            }
        }
        warnings
    }
}

#[derive(Args, Debug, Clone)]
pub struct FlushArgs {
    #[arg(value_enum)]
    pub chain: ChainArg,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Scenario file to replay
    pub scenario: PathBuf,
}

pub async fn run_command(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => GrindvaktConfig::load_from_path(path)?,
        None => GrindvaktConfig::load()?,
    };
    if let Some(socket) = cli.socket {
        config.control.socket_path = socket;
    }
    EventLogger::init(&config.telemetry.log_level);

    match cli.command {
        Commands::Serve => run_service(&config).await?,
        Commands::Add(args) => {
            for warning in args.filter_warnings() {
                warn!("{warning}");
            }
            let chain = ChainId::from(args.chain);
            let rule = args.rule();
            control_send(&config.control.socket_path, &Command::Add { chain, rule }).await?;
            info!(%chain, ?rule, "Rule added");
        }
        Commands::Flush(args) => {
            let chain = ChainId::from(args.chain);
            control_send(&config.control.socket_path, &Command::Flush { chain }).await?;
            info!(%chain, "Chain flushed");
        }
        Commands::Replay(args) => {
            let engine = FilterEngine::new(&config)?;
            let scenario = Scenario::load_from_file(&args.scenario)?;
            let report = scenario.replay(&engine)?;
            engine.shutdown();

            print!("{report}");
            if !report.is_success() {
                return Err(CliError::ReplayMismatch(report.mismatches.len()));
            }
        }
    }
    Ok(())
}
