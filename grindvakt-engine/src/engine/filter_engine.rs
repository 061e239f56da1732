//! ## grindvakt-engine::filter_engine
//! **The single owner of both chains**
//!
//! ### Expectations:
//! - Hooks never fail: unparseable or misaddressed packets are accepted
//! - Hot path does no label lookups and no allocation
//! - Shutdown flushes both chains before the engine is dropped

use std::fmt;
use std::time::Instant;

use grindvakt_config::{ChainConfig, GrindvaktConfig, PolicyAction};
use grindvakt_prevention::{Action, ChainId, ChainPolicy, Command, Firewall, FirewallError, Rule};
use grindvakt_protocols::Ipv4Parser;
use grindvakt_telemetry::MetricsRecorder;
use prometheus::IntCounter;
use tracing::{debug, info, trace};

use super::control::ControlChannel;
use super::error::EngineError;

/// Transport-level decision handed back to the packet source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accept,
    Drop,
}

impl From<Action> for Verdict {
    fn from(action: Action) -> Self {
        match action {
            Action::Accept => Verdict::Accept,
            Action::Drop => Verdict::Drop,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Accept => "accept",
            Verdict::Drop => "drop",
        })
    }
}

/// Metric handles of one chain, resolved once at startup.
#[derive(Debug)]
struct ChainCounters {
    accepted: IntCounter,
    dropped: IntCounter,
    rules_added: IntCounter,
    flushes: IntCounter,
}

impl ChainCounters {
    fn new(metrics: &MetricsRecorder, chain: ChainId) -> Self {
        let name = chain.as_str();
        Self {
            accepted: metrics.packet_counter(name, Action::Accept.as_str()),
            dropped: metrics.packet_counter(name, Action::Drop.as_str()),
            rules_added: metrics.rules_added_counter(name),
            flushes: metrics.chain_flushes_counter(name),
        }
    }

    #[inline]
    fn record(&self, action: Action) {
        match action {
            Action::Accept => self.accepted.inc(),
            Action::Drop => self.dropped.inc(),
        }
    }
}

#[derive(Debug)]
pub struct FilterEngine {
    firewall: Firewall,
    parser: Ipv4Parser,
    metrics: MetricsRecorder,
    input_counters: ChainCounters,
    output_counters: ChainCounters,
}

impl FilterEngine {
    pub fn new(config: &GrindvaktConfig) -> Result<Self, EngineError> {
        let prevention = &config.prevention;
        let firewall = Firewall::with_policies(
            chain_policy(&prevention.input),
            chain_policy(&prevention.output),
        );
        let metrics = MetricsRecorder::new()?;

        info!(
            input_default = %firewall.chain(ChainId::Input).default_action(),
            output_default = %firewall.chain(ChainId::Output).default_action(),
            input_max_rules = prevention.input.max_rules,
            output_max_rules = prevention.output.max_rules,
            "Filter engine started"
        );

        Ok(Self {
            input_counters: ChainCounters::new(&metrics, ChainId::Input),
            output_counters: ChainCounters::new(&metrics, ChainId::Output),
            firewall,
            parser: Ipv4Parser::new(),
            metrics,
        })
    }

    pub fn firewall(&self) -> &Firewall {
        &self.firewall
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Packets addressed to this host.
    #[inline]
    pub fn hook_local_in(&self, datagram: &[u8]) -> Verdict {
        self.packet_verdict(ChainId::Input, datagram)
    }

    /// Packets generated by this host.
    #[inline]
    pub fn hook_local_out(&self, datagram: &[u8]) -> Verdict {
        self.packet_verdict(ChainId::Output, datagram)
    }

    /// Packet path addressed by a raw chain id.
    pub fn hook_raw(&self, raw_chain: u32, datagram: &[u8]) -> Verdict {
        match self.firewall.packet_chain(raw_chain) {
            Some(chain) => self.packet_verdict(chain, datagram),
            None => Verdict::Accept,
        }
    }

    pub fn packet_verdict(&self, chain: ChainId, datagram: &[u8]) -> Verdict {
        let start = Instant::now();
        let packet = match self.parser.parse(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(%chain, error = %err, "Unparseable packet accepted");
                return Verdict::Accept;
            }
        };

        let action = self.firewall.chain(chain).traverse(&packet);
        self.counters(chain).record(action);
        self.metrics
            .traversal_latency
            .observe(start.elapsed().as_nanos() as f64);
        action.into()
    }

    /// Handle used by the control endpoint to apply encoded commands.
    pub fn control(&self) -> ControlChannel<'_> {
        ControlChannel::new(self)
    }

    pub fn command_apply(&self, command: &Command) -> Result<(), FirewallError> {
        let chain = command.chain();
        match *command {
            Command::Add { rule, .. } => self.rule_add(chain, rule),
            Command::Flush { .. } => self.chain_flush(chain).map(|_| ()),
        }
    }

    pub fn rule_add(&self, chain: ChainId, rule: Rule) -> Result<(), FirewallError> {
        self.firewall.rule_add(chain, rule)?;
        self.counters(chain).rules_added.inc();
        Ok(())
    }

    pub fn chain_flush(&self, chain: ChainId) -> Result<usize, FirewallError> {
        let removed = self.firewall.chain_flush(chain)?;
        self.counters(chain).flushes.inc();
        Ok(removed)
    }

    /// Flushes both chains. Returns the number of rules removed.
    pub fn shutdown(&self) -> usize {
        let removed = self.firewall.flush_all();
        for chain in ChainId::ALL {
            self.counters(chain).flushes.inc();
        }
        info!(removed, "Filter engine stopped");
        if let Ok(exposition) = self.metrics.gather_metrics() {
            debug!(metrics = %exposition, "Final metrics");
        }
        removed
    }

    pub(crate) fn inc_control_rejected(&self) {
        self.metrics.inc_control_rejected();
    }

    fn counters(&self, chain: ChainId) -> &ChainCounters {
        match chain {
            ChainId::Input => &self.input_counters,
            ChainId::Output => &self.output_counters,
        }
    }
}

fn chain_policy(config: &ChainConfig) -> ChainPolicy {
    ChainPolicy {
        default_action: match config.default_action {
            PolicyAction::Accept => Action::Accept,
            PolicyAction::Drop => Action::Drop,
        },
        max_rules: config.max_rules,
    }
}
