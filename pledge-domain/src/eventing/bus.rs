//! 事件总线（EventBus）协议
//!
//! 具名的发布/订阅通道，按主题分发消息，投递语义为“至少一次”。
//! 订阅返回 'static 生命周期的消息流，便于在 tokio::spawn 中消费。
//!
use crate::{error::DomainResult as Result, eventing::BusMessage};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 事件总线：负责按主题分发与订阅消息
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 通道名（pubsub name）
    fn pubsub_name(&self) -> &str;

    /// 发布到 `message.topic()`
    async fn publish(&self, message: &BusMessage) -> Result<()>;

    /// 订阅某一主题，返回 'static 生命周期的消息流
    async fn subscribe(&self, topic: &str) -> BoxStream<'static, Result<BusMessage>>;
}
