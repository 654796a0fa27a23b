//! Configuration for the node coordinator

use std::path::PathBuf;

use agora_logging::{AgoraSubscriberBuilder, LogConfig, WorkerGuard};
use agora_ranking::{DebugConfig, RankingCriteria};
use agora_referral::RepeatPolicy;
use agora_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Configuration for an [`AgoraNode`](crate::AgoraNode)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Base directory for all node data
    pub data_dir: PathBuf,
    /// Sync engine configuration
    pub sync: SyncConfig,
    /// Default ranking criteria
    pub ranking: RankingCriteria,
    /// Ranking breakdown reporting
    pub ranking_debug: DebugConfig,
    /// Limit on the repeatable conversion kind
    pub repeat_policy: RepeatPolicy,
    /// Logging configuration, applied by [`NodeConfig::init_logging`]
    pub log: LogConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::with_data_dir("./agora-data")
    }
}

impl NodeConfig {
    /// Create a configuration with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sync: SyncConfig::default(),
            ranking: RankingCriteria::default(),
            ranking_debug: DebugConfig::default(),
            repeat_policy: RepeatPolicy::default(),
            log: LogConfig::default(),
        }
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingCriteria) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_ranking_debug(mut self, debug: DebugConfig) -> Self {
        self.ranking_debug = debug;
        self
    }

    pub fn with_repeat_policy(mut self, repeat_policy: RepeatPolicy) -> Self {
        self.repeat_policy = repeat_policy;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Directory holding the node's persistent key-value store
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Install the global subscriber described by [`NodeConfig::log`]
    ///
    /// Keep the returned guard alive while file logging is wanted.
    pub fn init_logging(&self) -> Option<WorkerGuard> {
        AgoraSubscriberBuilder::new()
            .with_config(self.log.clone())
            .init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_data_dir() {
        let config = NodeConfig::with_data_dir("/tmp/agora-node");
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/agora-node/store"));
        assert_eq!(config.repeat_policy, RepeatPolicy::OncePerCalendarMonth);
        assert_eq!(config.sync.queue_capacity, 100);
        assert!(!config.ranking_debug.enabled);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: NodeConfig = serde_json::from_str(
            r#"{"data_dir": "/srv/agora", "repeat_policy": "unconstrained"}"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/agora"));
        assert_eq!(config.repeat_policy, RepeatPolicy::Unconstrained);
        assert_eq!(config.ranking, RankingCriteria::default());
        assert_eq!(config.log.default_level, "info");
    }
}
