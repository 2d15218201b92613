//! 死信（DeadLetterSink）
//!
//! 接收无法处理的消息：解码失败、永久错误，或重试耗尽的瞬时错误。
//! 提供内存实现（便于检查）与转投到死信主题的总线实现。
//!
use crate::error::DomainResult as Result;
use crate::eventing::{BusMessage, EventBus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const DEAD_LETTER_HANDLER_KEY: &str = "dead_letter.handler";
pub const DEAD_LETTER_REASON_KEY: &str = "dead_letter.reason";

/// 死信接收端
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// 记录一条处理失败的消息及其原因（区分具体 handler）
    async fn dead_letter(
        &self,
        handler_name: &str,
        message: &BusMessage,
        reason: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub handler_name: String,
    pub message: BusMessage,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// 内存死信表
#[derive(Clone, Default)]
pub struct InMemoryDeadLetters {
    inner: Arc<Mutex<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.inner
            .lock()
            .map(|g| g.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.letters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetters {
    async fn dead_letter(
        &self,
        handler_name: &str,
        message: &BusMessage,
        reason: &str,
    ) -> Result<()> {
        let letter = DeadLetter {
            handler_name: handler_name.to_string(),
            message: message.clone(),
            reason: reason.to_string(),
            at: Utc::now(),
        };
        match self.inner.lock() {
            Ok(mut g) => g.push(letter),
            Err(poisoned) => poisoned.into_inner().push(letter),
        }
        Ok(())
    }
}

/// 将死信转投到总线上的死信主题，原因写入消息元数据
pub struct BusDeadLetterSink {
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl BusDeadLetterSink {
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl DeadLetterSink for BusDeadLetterSink {
    async fn dead_letter(
        &self,
        handler_name: &str,
        message: &BusMessage,
        reason: &str,
    ) -> Result<()> {
        warn!(
            handler = handler_name,
            message_id = message.id(),
            dead_letter_topic = %self.topic,
            reason,
            "routing message to dead-letter topic"
        );
        let letter = message
            .forward_to(self.topic.clone())
            .with_metadata(DEAD_LETTER_HANDLER_KEY, handler_name)
            .with_metadata(DEAD_LETTER_REASON_KEY, reason);
        self.bus.publish(&letter).await
    }
}
