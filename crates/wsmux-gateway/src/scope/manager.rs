use dashmap::{DashMap, DashSet};

use wsmux_core::scope::{application_of, ConnectionId, ConnectionMeta, ScopeGate};

use crate::config::ScopeConfig;

/// Scope registry:
/// - `app -> enabled`
/// - `conn_id -> ConnectionMeta`
/// - `app -> {conn_id...}`
///
/// Only the application (first path segment) is ever checked; rooms and
/// deeper levels under an enabled application are always accepted.
#[derive(Default)]
pub struct ScopeManager {
    apps: DashMap<String, bool>,
    conns: DashMap<ConnectionId, ConnectionMeta>,
    app_index: DashMap<String, DashSet<ConnectionId>>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(scopes: &[ScopeConfig]) -> Self {
        let mgr = Self::new();
        for s in scopes {
            mgr.set_enabled(&s.app, s.enabled);
        }
        mgr
    }

    /// Enable or disable an application at runtime. Existing connections stay.
    pub fn set_enabled(&self, app: &str, enabled: bool) {
        tracing::info!(%app, enabled, "scope application state");
        self.apps.insert(app.to_string(), enabled);
    }

    pub fn is_app_enabled(&self, app: &str) -> bool {
        self.apps.get(app).map(|e| *e.value()).unwrap_or(false)
    }

    pub fn meta(&self, conn_id: ConnectionId) -> Option<ConnectionMeta> {
        self.conns.get(&conn_id).map(|r| r.value().clone())
    }

    pub fn connections_in(&self, app: &str) -> Vec<ConnectionId> {
        let Some(set) = self.app_index.get(app) else { return vec![]; };
        let mut ids: Vec<ConnectionId> = set.iter().map(|id| *id.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Every configured application with its enabled flag, sorted by name.
    pub fn apps(&self) -> Vec<(String, bool)> {
        let mut apps: Vec<(String, bool)> = self
            .apps
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        apps.sort();
        apps
    }

    pub fn registered_len(&self) -> usize {
        self.conns.len()
    }
}

impl ScopeGate for ScopeManager {
    fn is_enabled(&self, path: &str) -> bool {
        application_of(path).is_some_and(|app| self.is_app_enabled(app))
    }

    fn register(&self, conn_id: ConnectionId, meta: &ConnectionMeta) {
        if let Some(app) = application_of(&meta.path) {
            self.app_index
                .entry(app.to_string())
                .or_insert_with(DashSet::new)
                .insert(conn_id);
        }
        self.conns.insert(conn_id, meta.clone());
        tracing::debug!(conn_id, path = %meta.path, "connection registered");
    }

    fn unregister(&self, conn_id: ConnectionId) {
        let Some((_, meta)) = self.conns.remove(&conn_id) else { return; };
        if let Some(app) = application_of(&meta.path) {
            if let Some(set) = self.app_index.get(app) {
                set.remove(&conn_id);
                if set.is_empty() {
                    drop(set);
                    self.app_index.remove(app);
                }
            }
        }
        tracing::debug!(conn_id, "connection unregistered");
    }
}
