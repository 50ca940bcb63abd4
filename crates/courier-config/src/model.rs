// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos are rejected at
//! startup instead of silently falling back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP listener for webhooks and the operator API.
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared key-value store used for all cross-request coordination.
    #[serde(default)]
    pub store: StoreConfig,

    /// SQLite instance database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// WhatsApp gateway RPC endpoint.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Background job runner that performs instance deletion.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Downstream agent receiving coalesced messages.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Bounded-concurrency session start queue.
    #[serde(default)]
    pub start_queue: StartQueueConfig,

    /// Per-chat message coalescing.
    #[serde(default)]
    pub coalescer: CoalescerConfig,

    /// Stuck-QR detection.
    #[serde(default)]
    pub qr_guard: QrGuardConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Which shared store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store. Only coordinates requests handled by this process.
    #[default]
    Memory,
    /// Redis, shared by every replica.
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL. Required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix prepended to every key, separated by `:`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "courier".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .display()
        .to_string()
}

/// WhatsApp gateway (session RPC) settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    /// Sent as `X-Api-Key`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_key: None,
            timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    #[serde(default = "default_jobs_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            base_url: default_jobs_url(),
            api_key: None,
            timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

fn default_jobs_url() -> String {
    "http://127.0.0.1:8288".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,

    /// Sent as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_agent_endpoint(),
            api_key: None,
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

fn default_agent_endpoint() -> String {
    "http://127.0.0.1:8000/agent/invoke".to_string()
}

fn default_agent_timeout_secs() -> u64 {
    120
}

/// Session start queue policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StartQueueConfig {
    /// Ceiling on concurrently running session starts.
    #[serde(default = "default_max_concurrent_starts")]
    pub max_concurrent_starts: usize,

    /// Drains triggered within this window of the previous drain are skipped.
    #[serde(default = "default_drain_debounce_ms")]
    pub drain_debounce_ms: u64,

    /// Delay before a finished start triggers the next drain.
    #[serde(default = "default_follow_up_delay_ms")]
    pub follow_up_delay_ms: u64,

    /// Age after which a processing entry is presumed orphaned and reclaimed.
    #[serde(default = "default_slot_lease_secs")]
    pub slot_lease_secs: u64,
}

impl StartQueueConfig {
    pub fn drain_debounce(&self) -> Duration {
        Duration::from_millis(self.drain_debounce_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms)
    }

    pub fn slot_lease(&self) -> Duration {
        Duration::from_secs(self.slot_lease_secs)
    }
}

impl Default for StartQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_starts: default_max_concurrent_starts(),
            drain_debounce_ms: default_drain_debounce_ms(),
            follow_up_delay_ms: default_follow_up_delay_ms(),
            slot_lease_secs: default_slot_lease_secs(),
        }
    }
}

fn default_max_concurrent_starts() -> usize {
    3
}

fn default_drain_debounce_ms() -> u64 {
    2_000
}

fn default_follow_up_delay_ms() -> u64 {
    1_000
}

fn default_slot_lease_secs() -> u64 {
    300
}

/// Message coalescing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoalescerConfig {
    /// Quiet period a chat buffer must stay unchanged before it is drained.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,

    #[serde(default = "default_buffer_ttl_secs")]
    pub buffer_ttl_secs: u64,

    /// Lease on the per-chat busy flag.
    #[serde(default = "default_lock_lease_secs")]
    pub lock_lease_secs: u64,

    /// How long a seen message id suppresses duplicates.
    #[serde(default = "default_dedupe_ttl_secs")]
    pub dedupe_ttl_secs: u64,
}

impl CoalescerConfig {
    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    pub fn buffer_ttl(&self) -> Duration {
        Duration::from_secs(self.buffer_ttl_secs)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.lock_lease_secs)
    }

    pub fn dedupe_ttl(&self) -> Duration {
        Duration::from_secs(self.dedupe_ttl_secs)
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: default_stability_window_ms(),
            buffer_ttl_secs: default_buffer_ttl_secs(),
            lock_lease_secs: default_lock_lease_secs(),
            dedupe_ttl_secs: default_dedupe_ttl_secs(),
        }
    }
}

fn default_stability_window_ms() -> u64 {
    3_000
}

fn default_buffer_ttl_secs() -> u64 {
    3_600
}

fn default_lock_lease_secs() -> u64 {
    300
}

fn default_dedupe_ttl_secs() -> u64 {
    3_600
}

/// Stuck-QR detection policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QrGuardConfig {
    /// Consecutive QR events that trigger the instance delete.
    #[serde(default = "default_qr_threshold")]
    pub threshold: u32,

    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,
}

impl QrGuardConfig {
    pub fn counter_ttl(&self) -> Duration {
        Duration::from_secs(self.counter_ttl_secs)
    }
}

impl Default for QrGuardConfig {
    fn default() -> Self {
        Self {
            threshold: default_qr_threshold(),
            counter_ttl_secs: default_counter_ttl_secs(),
        }
    }
}

fn default_qr_threshold() -> u32 {
    5
}

fn default_counter_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
