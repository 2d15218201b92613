//! 内存版状态存储（InMemoryStateStore）
//!
//! 基于 `DashMap` 的 `StateStore` 实现，用于测试、示例与本地开发：
//! - 已提交记录与缓冲写入分别存放；
//! - `save` 在同一分片锁内完成整批合并，读取方不会看到半提交的状态。
//!
use crate::error::DomainResult as Result;
use crate::persist::{SerializedState, StateStore};
use crate::value_object::ActorIdentity;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

type Records = HashMap<String, SerializedState>;

#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    committed: Arc<DashMap<ActorIdentity, Records>>,
    pending: Arc<DashMap<ActorIdentity, Records>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前持有已提交状态的 Actor 数量
    pub fn identities(&self) -> usize {
        self.committed.len()
    }

    /// 当前持有未提交缓冲写入的 Actor 数量
    pub fn staged(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn contains(&self, identity: &ActorIdentity, state_key: &str) -> Result<bool> {
        Ok(self
            .committed
            .get(identity)
            .is_some_and(|records| records.contains_key(state_key)))
    }

    async fn get(
        &self,
        identity: &ActorIdentity,
        state_key: &str,
    ) -> Result<Option<SerializedState>> {
        Ok(self
            .committed
            .get(identity)
            .and_then(|records| records.get(state_key).cloned()))
    }

    async fn set(&self, identity: &ActorIdentity, state: SerializedState) -> Result<()> {
        self.pending
            .entry(identity.clone())
            .or_default()
            .insert(state.state_key().to_string(), state);
        Ok(())
    }

    async fn save(&self, identity: &ActorIdentity) -> Result<()> {
        let Some((_, staged)) = self.pending.remove(identity) else {
            return Ok(());
        };

        self.committed
            .entry(identity.clone())
            .or_default()
            .extend(staged);
        Ok(())
    }

    async fn discard(&self, identity: &ActorIdentity) -> Result<()> {
        self.pending.remove(identity);
        Ok(())
    }
}
