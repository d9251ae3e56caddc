//! Shared application state for the wsmux gateway.
//!
//! Built once at startup. Construction verifies the accept-hash primitive so a
//! broken build fails before the listener binds, never per connection.

use std::sync::Arc;

use wsmux_core::error::Result;
use wsmux_core::protocol::response::verify_accept_algorithm;

use crate::classifier::{ProtocolRouter, RouterConfig};
use crate::config::GatewayConfig;
use crate::obs::GatewayMetrics;
use crate::scope::ScopeManager;
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    scopes: Arc<ScopeManager>,
    router: ProtocolRouter,
    metrics: Arc<GatewayMetrics>,
    upstream: Arc<dyn Upstream>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        verify_accept_algorithm()?;

        let scopes = Arc::new(ScopeManager::from_config(&cfg.scopes));
        let metrics = Arc::new(GatewayMetrics::default());
        let router = ProtocolRouter::new(
            Arc::clone(&scopes) as Arc<dyn wsmux_core::scope::ScopeGate>,
            RouterConfig::from(&cfg.gateway),
            Arc::clone(&metrics),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                scopes,
                router,
                metrics,
                upstream,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn router(&self) -> &ProtocolRouter {
        &self.inner.router
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.inner.scopes
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    pub fn upstream(&self) -> &dyn Upstream {
        self.inner.upstream.as_ref()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Point-in-time gauges appended to `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("wsmux_connections_tracked", self.inner.router.len() as u64),
            ("wsmux_scope_connections_registered", self.inner.scopes.registered_len() as u64),
        ]
    }
}
