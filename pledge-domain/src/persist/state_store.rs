//! 状态存储协议（StateStore）
//!
//! 以 (Actor 身份, 状态键) 寻址的键值存储：
//! - `set` 只写入该身份的缓冲区；
//! - `save` 将缓冲区整体原子提交，要么全部可见，要么全部不可见；
//! - `discard` 丢弃该身份未提交的缓冲写入；
//! - `get`/`contains` 只读取已提交的记录。
//!
use crate::{
    error::DomainResult as Result,
    persist::{ActorState, SerializedState},
    value_object::ActorIdentity,
};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn contains(&self, identity: &ActorIdentity, state_key: &str) -> Result<bool>;

    async fn get(
        &self,
        identity: &ActorIdentity,
        state_key: &str,
    ) -> Result<Option<SerializedState>>;

    /// 缓冲写入，直到 `save` 才对读取方可见
    async fn set(&self, identity: &ActorIdentity, state: SerializedState) -> Result<()>;

    /// 原子提交该身份下所有缓冲写入
    async fn save(&self, identity: &ActorIdentity) -> Result<()>;

    /// 丢弃该身份尚未提交的缓冲写入
    async fn discard(&self, identity: &ActorIdentity) -> Result<()>;
}

#[async_trait]
impl<T> StateStore for Arc<T>
where
    T: StateStore + ?Sized,
{
    async fn contains(&self, identity: &ActorIdentity, state_key: &str) -> Result<bool> {
        (**self).contains(identity, state_key).await
    }

    async fn get(
        &self,
        identity: &ActorIdentity,
        state_key: &str,
    ) -> Result<Option<SerializedState>> {
        (**self).get(identity, state_key).await
    }

    async fn set(&self, identity: &ActorIdentity, state: SerializedState) -> Result<()> {
        (**self).set(identity, state).await
    }

    async fn save(&self, identity: &ActorIdentity) -> Result<()> {
        (**self).save(identity).await
    }

    async fn discard(&self, identity: &ActorIdentity) -> Result<()> {
        (**self).discard(identity).await
    }
}

/// 面向类型化状态的便捷方法
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// 读取状态；不存在时返回确定的空默认值（首次事件并非错误）
    async fn load_or_default<S>(&self, identity: &ActorIdentity) -> Result<S>
    where
        S: ActorState,
    {
        if !self.contains(identity, S::KEY).await? {
            return Ok(S::default());
        }

        match self.get(identity, S::KEY).await? {
            Some(record) => record.to_state::<S>(),
            None => Ok(S::default()),
        }
    }

    /// 缓冲写入一个类型化状态
    async fn stage<S>(&self, identity: &ActorIdentity, state: &S) -> Result<()>
    where
        S: ActorState,
    {
        let record = SerializedState::from_state(state)?;
        self.set(identity, record).await
    }
}

impl<T> StateStoreExt for T where T: StateStore + ?Sized {}
