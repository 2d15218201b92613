//! 募捐活动 Actor（CampaignActor）
//!
//! 一个活动标识对应一个 Actor，负责把认捐事件应用到该活动的两条状态记录。
//! Actor 本身不加锁：同一标识的调用必须由 `ActorRuntime` 串行化。
//!
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::campaign::state::{CampaignAggregateState, CampaignRecentPledges, CampaignSnapshot};
use crate::error::{DomainError, DomainResult as Result};
use crate::persist::{ActorState, StateStore, StateStoreExt};
use crate::pledge_event::PledgeEvent;
use crate::value_object::{ActorIdentity, CampaignId};

pub const CAMPAIGN_ACTOR_TYPE: &str = "CampaignActorType";

/// Actor 状态配置
#[derive(Clone, Copy, Debug)]
pub struct CampaignConfig {
    /// 最近认捐序列的容量
    pub recent_capacity: usize,
    /// 每个活动记住的已应用幂等键数量，0 表示不去重
    pub dedup_window: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            recent_capacity: 10,
            dedup_window: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 已应用，携带应用后的认捐计数
    Applied { pledges: u64 },
    /// 幂等键已在窗口内，未做任何修改
    Duplicate,
}

pub struct CampaignActor {
    identity: ActorIdentity,
    store: Arc<dyn StateStore>,
    config: CampaignConfig,
}

impl CampaignActor {
    pub fn new(campaign_id: CampaignId, store: Arc<dyn StateStore>, config: CampaignConfig) -> Self {
        Self {
            identity: ActorIdentity::new(CAMPAIGN_ACTOR_TYPE, campaign_id),
            store,
            config,
        }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn campaign_id(&self) -> &CampaignId {
        self.identity.actor_id()
    }

    /// 应用一笔认捐：
    /// 1. 读取 `main`（缺省为空）并累加计数与金额，缓冲写入；
    /// 2. 读取 `pledges`（缺省为空）并追加、淘汰，缓冲写入；
    /// 3. 一次 `save` 原子提交两条记录。
    ///
    /// 任一读写失败都直接返回，不会留下只提交了一条记录的状态；
    /// 失败时丢弃已缓冲的写入。
    #[instrument(skip_all, fields(campaign_id = %self.campaign_id()))]
    pub async fn apply_pledge(&self, event: &PledgeEvent) -> Result<ApplyOutcome> {
        if event.campaign_id() != self.campaign_id() {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "pledge for campaign {} delivered to actor {}",
                    event.campaign_id(),
                    self.identity
                ),
            });
        }

        let mut main: CampaignAggregateState = self.store.load_or_default(&self.identity).await?;
        if let Some(id) = event.event_id()
            && main.has_applied(id)
        {
            debug!(event_id = id, "duplicate pledge ignored");
            return Ok(ApplyOutcome::Duplicate);
        }

        let mut recent: CampaignRecentPledges = self.store.load_or_default(&self.identity).await?;
        self.ensure_same_version(&main, &recent)?;

        main.apply(event, self.config.dedup_window);
        recent.push(event.clone(), self.config.recent_capacity);
        if let Err(err) = self.commit(&main, &recent).await {
            if let Err(discard_err) = self.store.discard(&self.identity).await {
                warn!(error = %discard_err, "failed to discard staged state");
            }
            return Err(err);
        }

        debug!(
            pledges = main.pledges(),
            currency = event.currency(),
            "pledge applied"
        );
        Ok(ApplyOutcome::Applied {
            pledges: main.pledges(),
        })
    }

    async fn commit(
        &self,
        main: &CampaignAggregateState,
        recent: &CampaignRecentPledges,
    ) -> Result<()> {
        self.store.stage(&self.identity, main).await?;
        self.store.stage(&self.identity, recent).await?;
        self.store.save(&self.identity).await
    }

    /// 读取两条记录（缺省为空），并校验版本一致
    pub async fn snapshot(&self) -> Result<CampaignSnapshot> {
        let main: CampaignAggregateState = self.store.load_or_default(&self.identity).await?;
        let recent: CampaignRecentPledges = self.store.load_or_default(&self.identity).await?;
        self.ensure_same_version(&main, &recent)?;

        Ok(CampaignSnapshot {
            campaign_id: self.campaign_id().clone(),
            main,
            recent,
        })
    }

    fn ensure_same_version(
        &self,
        main: &CampaignAggregateState,
        recent: &CampaignRecentPledges,
    ) -> Result<()> {
        if main.version() != recent.version() {
            return Err(DomainError::VersionConflict {
                campaign_id: self.campaign_id().to_string(),
                main: main.version().value(),
                pledges: recent.version().value(),
            });
        }
        Ok(())
    }
}
