//! Actor 运行时（ActorRuntime）
//!
//! 以活动标识寻址 `CampaignActor`，并保证同一标识的调用按轮次串行执行：
//! - 每个活跃标识对应一把异步互斥锁，首次调用时激活；
//! - 轮次结束后若无其他调用持有或等待该锁，则从注册表中移除（去激活）；
//! - 不同标识之间完全并行，互不阻塞。
//!
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::trace;

use crate::campaign::{ApplyOutcome, CampaignActor, CampaignConfig, CampaignSnapshot};
use crate::error::DomainResult as Result;
use crate::persist::StateStore;
use crate::pledge_event::PledgeEvent;
use crate::value_object::CampaignId;

pub struct ActorRuntime {
    store: Arc<dyn StateStore>,
    config: CampaignConfig,
    turns: DashMap<CampaignId, Arc<Mutex<()>>>,
}

impl ActorRuntime {
    pub fn new(store: Arc<dyn StateStore>, config: CampaignConfig) -> Self {
        Self {
            store,
            config,
            turns: DashMap::new(),
        }
    }

    /// 当前已激活（正在执行或排队）的 Actor 数量
    pub fn active_actors(&self) -> usize {
        self.turns.len()
    }

    /// 将认捐路由到其活动对应的 Actor，身份即活动标识
    pub async fn apply_pledge(&self, event: &PledgeEvent) -> Result<ApplyOutcome> {
        self.turn(event.campaign_id(), |actor| async move {
            actor.apply_pledge(event).await
        })
        .await
    }

    /// 在一个轮次内读取活动状态，不会观察到应用到一半的事件
    pub async fn snapshot(&self, campaign_id: &CampaignId) -> Result<CampaignSnapshot> {
        self.turn(campaign_id, |actor| async move { actor.snapshot().await })
            .await
    }

    async fn turn<F, Fut, T>(&self, campaign_id: &CampaignId, f: F) -> T
    where
        F: FnOnce(CampaignActor) -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.turns.entry(campaign_id.clone()).or_default().clone();

        let out = {
            let _guard = lock.lock().await;
            trace!(campaign_id = %campaign_id, "turn started");
            let actor = CampaignActor::new(campaign_id.clone(), self.store.clone(), self.config);
            f(actor).await
        };

        drop(lock);
        // 注册表自身持有一份引用；计数为 1 说明没有其他调用在持有或等待
        self.turns
            .remove_if(campaign_id, |_, lock| Arc::strong_count(lock) == 1);

        out
    }
}
