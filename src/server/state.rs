//! Server state management

use crate::api::CacheStatsResponse;
use crate::config::{AppInfo, ConfigManager, CorsConfig, ServerConfig};
use crate::runtime::ModelManager;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// Model lifecycle and inference
    pub manager: Arc<ModelManager>,

    /// Merged configuration (served in part by `/api/v1/config`)
    pub config: Arc<ConfigManager>,

    /// Response cache counters
    pub cache: Arc<CacheStats>,

    /// Process start, for `uptime`
    pub started_at: Instant,
}

impl ServerState {
    pub fn new(manager: Arc<ModelManager>, config: Arc<ConfigManager>) -> Self {
        Self {
            manager,
            config,
            cache: Arc::new(CacheStats::default()),
            started_at: Instant::now(),
        }
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.config.settings().app
    }

    pub fn server_config(&self) -> &ServerConfig {
        self.config.server_config()
    }

    pub fn cors_config(&self) -> &CorsConfig {
        &self.config.settings().cors
    }

    pub fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Counters of the response cache. No responses are stored, so lookups
/// are never hits.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    total_requests: AtomicU64,
}

impl CacheStats {
    pub fn record_miss(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsResponse {
        let hits = self.hits.load(Ordering::Relaxed);
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let hit_rate = if total_requests > 0 {
            hits as f64 / total_requests as f64
        } else {
            0.0
        };

        CacheStatsResponse {
            cache_hits: hits,
            cache_misses: self.misses.load(Ordering::Relaxed),
            cache_size: 0,
            hit_rate,
            total_requests,
        }
    }
}
