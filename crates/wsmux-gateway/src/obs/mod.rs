//! Lightweight in-process metrics.
//!
//! Counters and gauges are atomics keyed by label sets and rendered in the
//! Prometheus text format by the `/metrics` ops handler.

pub mod metrics;

pub use metrics::GatewayMetrics;
