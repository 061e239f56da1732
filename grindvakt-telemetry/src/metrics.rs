//! ## grindvakt-telemetry::metrics
//! **Prometheus counters and the traversal latency histogram**
//!
//! Labelled counters are resolved once through the `*_counter` helpers and
//! the handles kept by the caller, so the packet path never does a label
//! lookup.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    /// Packets seen per chain and verdict.
    pub packets: IntCounterVec,
    pub rules_added: IntCounterVec,
    pub chain_flushes: IntCounterVec,
    /// Control writes refused before touching any chain.
    pub control_rejected: IntCounter,
    pub traversal_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let packets = IntCounterVec::new(
            Opts::new("grindvakt_packets_total", "Packets evaluated by a chain"),
            &["chain", "verdict"],
        )?;
        let rules_added = IntCounterVec::new(
            Opts::new("grindvakt_rules_added_total", "Rules appended to a chain"),
            &["chain"],
        )?;
        let chain_flushes = IntCounterVec::new(
            Opts::new("grindvakt_chain_flushes_total", "Chain flushes"),
            &["chain"],
        )?;
        let control_rejected = IntCounter::new(
            "grindvakt_control_rejected_total",
            "Control commands rejected",
        )?;
        let traversal_latency = Histogram::with_opts(
            HistogramOpts::new(
                "grindvakt_traversal_latency_ns",
                "Time spent parsing and traversing one packet",
            )
            .buckets(vec![100.0, 1_000.0, 10_000.0, 100_000.0]),
        )?;

        registry.register(Box::new(packets.clone()))?;
        registry.register(Box::new(rules_added.clone()))?;
        registry.register(Box::new(chain_flushes.clone()))?;
        registry.register(Box::new(control_rejected.clone()))?;
        registry.register(Box::new(traversal_latency.clone()))?;

        Ok(Self {
            registry,
            packets,
            rules_added,
            chain_flushes,
            control_rejected,
            traversal_latency,
        })
    }

    pub fn packet_counter(&self, chain: &str, verdict: &str) -> IntCounter {
        self.packets.with_label_values(&[chain, verdict])
    }

    pub fn rules_added_counter(&self, chain: &str) -> IntCounter {
        self.rules_added.with_label_values(&[chain])
    }

    pub fn chain_flushes_counter(&self, chain: &str) -> IntCounter {
        self.chain_flushes.with_label_values(&[chain])
    }

    pub fn inc_control_rejected(&self) {
        self.control_rejected.inc();
    }

    /// Text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
