//! 内存版事件总线（InMemoryEventBus）
//!
//! 每个主题一条 `tokio::sync::broadcast` 通道，满足 `EventBus` 协议：
//! - `publish`：克隆并广播到消息所属主题；
//! - `subscribe`：返回 `'static` 生命周期消息流，便于在 `tokio::spawn` 中使用；
//! - 典型用途：测试环境、示例与本地开发。
//!
//! 注意：发布时若该主题尚无订阅者，消息将被丢弃；订阅者落后超过缓冲容量时，
//! 流中会出现一条 `EventBus` 错误并跳过被覆盖的消息。

use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::{BusMessage, EventBus};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

#[derive(Clone)]
pub struct InMemoryEventBus {
    pubsub_name: String,
    capacity: usize,
    topics: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
}

impl InMemoryEventBus {
    /// 创建一个内存总线，`capacity` 为每个主题的广播缓冲区容量
    pub fn new(pubsub_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            pubsub_name: pubsub_name.into(),
            capacity: capacity.max(1),
            topics: Arc::new(DashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn pubsub_name(&self) -> &str {
        &self.pubsub_name
    }

    async fn publish(&self, message: &BusMessage) -> Result<()> {
        if message.pubsub_name() != self.pubsub_name {
            return Err(DomainError::event_bus(format!(
                "unknown pubsub {}, this bus is {}",
                message.pubsub_name(),
                self.pubsub_name
            )));
        }

        // 若当前无订阅者，broadcast 的 send 会返回错误，这里视为非致命并忽略
        if self.sender(message.topic()).send(message.clone()).is_err() {
            trace!(topic = message.topic(), "no subscribers, message dropped");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BoxStream<'static, Result<BusMessage>> {
        let rx = self.sender(topic).subscribe();
        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| DomainError::event_bus(e.to_string())));
        Box::pin(stream)
    }
}
