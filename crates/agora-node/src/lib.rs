//! # Agora Node
//!
//! Composition root for one Agora process.
//!
//! [`AgoraNode`] constructs and owns:
//! - The persistent store (file-backed under `data_dir/store`, or in memory)
//! - The [`SyncEngine`] following the change feed
//! - The [`PointsAccountingEngine`] talking to the referral store
//! - The [`RankingEngine`], whose points lookup is the accounting engine
//!
//! ## Example
//!
//! ```rust,ignore
//! use agora_node::{AgoraNode, NodeConfig};
//!
//! let config = NodeConfig::with_data_dir("./my-node");
//! let _log_guard = config.init_logging();
//! let node = AgoraNode::new(config, feed, referral_store).await?;
//!
//! node.sync().register("inbox", |event| {
//!     println!("{}", event.kind());
//!     Ok(())
//! });
//! node.start().await?;
//!
//! let ranking = node.rank(candidates, &RankingContext::at(here)).await?;
//! node.shutdown().await?;
//! ```

mod config;
mod error;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use agora_core::{ChangeFeedClient, PersistentStore};
use agora_ranking::{Candidate, Ranking, RankingContext, RankingEngine};
use agora_referral::{PointsAccountingEngine, ReferralStore};
use agora_storage::{FileStore, InMemoryStore};
use agora_sync::SyncEngine;
use tracing::{info, instrument, warn};

/// One Agora process: the engines plus their shared collaborators
pub struct AgoraNode {
    config: NodeConfig,
    store: Arc<dyn PersistentStore>,
    sync: SyncEngine,
    accounting: Arc<PointsAccountingEngine>,
    ranking: RankingEngine,
    started: AtomicBool,
}

impl AgoraNode {
    /// Build a node whose store lives under `config.data_dir`
    pub async fn new(
        config: NodeConfig,
        feed: Arc<dyn ChangeFeedClient>,
        referral_store: Arc<dyn ReferralStore>,
    ) -> NodeResult<Self> {
        let store = FileStore::open(config.store_dir()).await?;
        info!(data_dir = %config.data_dir.display(), "Opened node store");
        Self::assemble(config, feed, referral_store, Arc::new(store))
    }

    /// Build a node that keeps nothing across restarts
    pub fn in_memory(
        config: NodeConfig,
        feed: Arc<dyn ChangeFeedClient>,
        referral_store: Arc<dyn ReferralStore>,
    ) -> NodeResult<Self> {
        Self::assemble(config, feed, referral_store, Arc::new(InMemoryStore::new()))
    }

    /// Build a node around an existing store
    pub fn with_store(
        config: NodeConfig,
        feed: Arc<dyn ChangeFeedClient>,
        referral_store: Arc<dyn ReferralStore>,
        store: Arc<dyn PersistentStore>,
    ) -> NodeResult<Self> {
        Self::assemble(config, feed, referral_store, store)
    }

    fn assemble(
        config: NodeConfig,
        feed: Arc<dyn ChangeFeedClient>,
        referral_store: Arc<dyn ReferralStore>,
        store: Arc<dyn PersistentStore>,
    ) -> NodeResult<Self> {
        config.ranking.validate()?;

        let sync = SyncEngine::new(feed, store.clone(), config.sync.clone());
        let accounting = Arc::new(
            PointsAccountingEngine::new(referral_store).with_repeat_policy(config.repeat_policy),
        );
        let ranking = RankingEngine::new(accounting.clone()).with_debug(config.ranking_debug);

        Ok(Self {
            config,
            store,
            sync,
            accounting,
            ranking,
            started: AtomicBool::new(false),
        })
    }

    /// Connect the sync engine
    ///
    /// A failed connection is returned, but the node counts as started: the
    /// sync engine keeps retrying in the background until
    /// [`shutdown`](Self::shutdown).
    #[instrument(skip(self))]
    pub async fn start(&self) -> NodeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        match self.sync.initialize().await {
            Ok(()) => {
                info!("Node started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Node started without a live feed");
                Err(e.into())
            }
        }
    }

    /// Stop syncing and drop every listener; queued events stay persisted
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> NodeResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.sync.cleanup().await;
        info!("Node stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Force a fresh sync attempt with a renewed retry budget
    ///
    /// Listeners are dropped by the teardown and must be registered again.
    pub async fn refresh(&self) -> NodeResult<()> {
        if !self.is_started() {
            return Err(NodeError::NotStarted);
        }
        Ok(self.sync.force_sync_refresh().await?)
    }

    /// Rank `candidates` with the configured criteria
    pub async fn rank(
        &self,
        candidates: Vec<Candidate>,
        ctx: &RankingContext,
    ) -> NodeResult<Ranking> {
        Ok(self
            .ranking
            .rank(candidates, &self.config.ranking, ctx)
            .await?)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn accounting(&self) -> &Arc<PointsAccountingEngine> {
        &self.accounting
    }

    pub fn ranking(&self) -> &RankingEngine {
        &self.ranking
    }
}
