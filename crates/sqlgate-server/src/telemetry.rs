//! Prometheus metrics for tool calls
//!
//! The registry is owned by the server state rather than a process global, so
//! tests can build as many as they like.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Telemetry {
    registry: Registry,
    tool_calls: IntCounterVec,
    guardrail_blocks: IntCounterVec,
    tool_latency: HistogramVec,
}

impl Telemetry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("sqlgate".to_string()), None)?;

        let tool_calls = IntCounterVec::new(
            Opts::new("tool_calls_total", "Tool calls by tool and outcome"),
            &["tool", "outcome"],
        )?;
        let guardrail_blocks = IntCounterVec::new(
            Opts::new("guardrail_blocks_total", "Generated SQL rejected by guardrails"),
            &["reason"],
        )?;
        let tool_latency = HistogramVec::new(
            HistogramOpts::new("tool_duration_seconds", "Tool call latency in seconds")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["tool"],
        )?;

        registry.register(Box::new(tool_calls.clone()))?;
        registry.register(Box::new(guardrail_blocks.clone()))?;
        registry.register(Box::new(tool_latency.clone()))?;

        Ok(Self {
            registry,
            tool_calls,
            guardrail_blocks,
            tool_latency,
        })
    }

    pub fn observe(&self, tool: &str, outcome: &str, seconds: f64) {
        // Unknown tool names would otherwise mint unbounded label values
        let tool = if crate::tools::TOOL_NAMES.contains(&tool) {
            tool
        } else {
            "unknown"
        };
        self.tool_calls.with_label_values(&[tool, outcome]).inc();
        self.tool_latency.with_label_values(&[tool]).observe(seconds);
    }

    pub fn guardrail_blocked(&self, reason: &str) {
        self.guardrail_blocks.with_label_values(&[reason]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
