use std::time::Duration;

use clap::{ArgAction, Parser};
use shared::model::WorkerConfig;

#[derive(Debug, Clone, Parser)]
#[clap(name = "offline worker proxy")]
pub struct Cli {
    /// Origin every request is forwarded to
    #[clap(long, env, default_value = "http://127.0.0.1:8000")]
    pub upstream_url: String,
    #[clap(long, env, default_value = "worker.sqlite")]
    pub sqlite_connection_string: String,
    #[clap(long, env, default_value = "8080")]
    pub port: u16,
    #[clap(long, env, default_value = "127.0.0.1")]
    pub bind_addr: String,
    /// Suffix of the cache names. Changing it evicts the old caches on the
    /// next activation
    #[arg(long, env, default_value = "v1")]
    pub cache_version: String,
    #[arg(long, env, default_value = "2000")]
    pub slow_request_threshold_ms: u64,
    #[arg(long, env, default_value = "256")]
    pub diagnostics_channel_bound: usize,
    #[arg(long, env, default_value = "30")]
    pub diagnostics_retention_days: i64,
    #[arg(long, env, default_value = "30")]
    pub upstream_timeout_secs: u64,
    /// Extra attempts for monitored routes before falling back to the cache
    #[arg(long, env, default_value = "0")]
    pub monitored_retries: usize,
    /// Serve the offline page for failed navigations on every route, not
    /// just the monitored ones
    #[arg(long, env, default_value = "false")]
    pub offline_fallback_everywhere: bool,
    #[arg(long, env, default_value_t = true, action = ArgAction::Set)]
    pub skip_waiting: bool,
    #[arg(long, env, default_value = "10485760")]
    pub max_request_body_bytes: usize,
}

impl Cli {
    pub fn worker_config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::versioned(&self.cache_version);
        config.slow_request_threshold_ms = self.slow_request_threshold_ms;
        config.skip_waiting = self.skip_waiting;
        config.policies.monitored.retries = self.monitored_retries;
        if self.offline_fallback_everywhere {
            config.policies.default.offline_fallback = true;
        }
        config
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
