use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{default_monitored_patterns, default_static_assets};

pub const DEFAULT_CACHE_VERSION: &str = "v1";
pub const DEFAULT_SLOW_REQUEST_THRESHOLD_MS: u64 = 2000;

/// Which handling a request gets, decided purely from its method and URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Not intercepted, forwarded as is
    Passthrough,
    Monitored,
    StaticAsset,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Static,
    Runtime,
}

/// How an intercepted route is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pub strategy: Strategy,
    pub namespace: Namespace,
    /// Emit slow_request/network_error records
    pub record_diagnostics: bool,
    /// Answer failed navigations with the offline page
    pub offline_fallback: bool,
    /// Extra network attempts after the first failure
    pub retries: usize,
}

impl RoutePolicy {
    pub const fn monitored() -> Self {
        Self {
            strategy: Strategy::NetworkFirst,
            namespace: Namespace::Runtime,
            record_diagnostics: true,
            offline_fallback: true,
            retries: 0,
        }
    }

    pub const fn static_asset() -> Self {
        Self {
            strategy: Strategy::CacheFirst,
            namespace: Namespace::Static,
            record_diagnostics: false,
            offline_fallback: false,
            retries: 0,
        }
    }

    pub const fn fallthrough() -> Self {
        Self {
            strategy: Strategy::NetworkFirst,
            namespace: Namespace::Runtime,
            record_diagnostics: false,
            offline_fallback: false,
            retries: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePolicies {
    pub monitored: RoutePolicy,
    pub static_asset: RoutePolicy,
    pub default: RoutePolicy,
}

impl Default for RoutePolicies {
    fn default() -> Self {
        Self {
            monitored: RoutePolicy::monitored(),
            static_asset: RoutePolicy::static_asset(),
            default: RoutePolicy::fallthrough(),
        }
    }
}

impl RoutePolicies {
    /// Passthrough requests have no policy
    pub fn get(&self, class: RouteClass) -> Option<&RoutePolicy> {
        match class {
            RouteClass::Passthrough => None,
            RouteClass::Monitored => Some(&self.monitored),
            RouteClass::StaticAsset => Some(&self.static_asset),
            RouteClass::Default => Some(&self.default),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub static_cache_name: String,
    pub runtime_cache_name: String,
    /// Exact paths pre-cached on install
    pub static_assets: Vec<String>,
    /// Substrings of the path that select the monitored route
    pub monitored_patterns: Vec<String>,
    pub slow_request_threshold_ms: u64,
    /// Activate straight after install instead of waiting for SKIP_WAITING
    pub skip_waiting: bool,
    pub policies: RoutePolicies,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::versioned(DEFAULT_CACHE_VERSION)
    }
}

impl WorkerConfig {
    /// Config with cache names derived from a version tag, e.g. `static-v1`
    pub fn versioned(version: &str) -> Self {
        Self {
            static_cache_name: format!("static-{version}"),
            runtime_cache_name: format!("runtime-{version}"),
            static_assets: default_static_assets(),
            monitored_patterns: default_monitored_patterns(),
            slow_request_threshold_ms: DEFAULT_SLOW_REQUEST_THRESHOLD_MS,
            skip_waiting: true,
            policies: RoutePolicies::default(),
        }
    }

    pub fn cache_name(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Static => &self.static_cache_name,
            Namespace::Runtime => &self.runtime_cache_name,
        }
    }

    /// Whether a namespace survives activation
    pub fn is_current_cache(&self, name: &str) -> bool {
        name == self.static_cache_name || name == self.runtime_cache_name
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }
}
