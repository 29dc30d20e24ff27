//! Scheduler configuration and builder.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Scheduler`].
///
/// Meant to be embedded inside a larger node configuration (the way
/// `neuroquantum_cluster::ClusterConfig` embeds `ShardingConfig`) and
/// (de)serialized there; this crate exposes no config file format or CLI
/// surface of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Quantum multiplier for the namespace system table's `TableQueue`.
    pub meta_table_priority: u32,

    /// Quantum multiplier for other system tables.
    pub system_table_priority: u32,

    /// Quantum multiplier for ordinary user tables.
    pub user_table_priority: u32,

    /// Number of buckets the server `KeyedIndex` is sharded across.
    ///
    /// Spec §4.3 treats this as a compile-time constant (128); it is left
    /// configurable here so tests can use a small bucket count to exercise
    /// collisions without needing thousands of servers.
    pub server_bucket_count: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            meta_table_priority: 3,
            system_table_priority: 2,
            user_table_priority: 1,
            server_bucket_count: 128,
        }
    }
}

impl SchedulerConfig {
    /// Start building a configuration from defaults.
    #[must_use]
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Default, Clone)]
pub struct SchedulerConfigBuilder {
    config: OptionalConfig,
}

#[derive(Debug, Default, Clone)]
struct OptionalConfig {
    meta_table_priority: Option<u32>,
    system_table_priority: Option<u32>,
    user_table_priority: Option<u32>,
    server_bucket_count: Option<usize>,
}

impl SchedulerConfigBuilder {
    #[must_use]
    pub fn meta_table_priority(mut self, value: u32) -> Self {
        self.config.meta_table_priority = Some(value);
        self
    }

    #[must_use]
    pub fn system_table_priority(mut self, value: u32) -> Self {
        self.config.system_table_priority = Some(value);
        self
    }

    #[must_use]
    pub fn user_table_priority(mut self, value: u32) -> Self {
        self.config.user_table_priority = Some(value);
        self
    }

    #[must_use]
    pub fn server_bucket_count(mut self, value: usize) -> Self {
        self.config.server_bucket_count = Some(value);
        self
    }

    #[must_use]
    pub fn build(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            meta_table_priority: self.config.meta_table_priority.unwrap_or(defaults.meta_table_priority),
            system_table_priority: self
                .config
                .system_table_priority
                .unwrap_or(defaults.system_table_priority),
            user_table_priority: self.config.user_table_priority.unwrap_or(defaults.user_table_priority),
            server_bucket_count: self
                .config
                .server_bucket_count
                .unwrap_or(defaults.server_bucket_count),
        }
    }
}
