//! 主题处理器（TopicHandler）
//!
//! 定义消费某一主题消息的处理逻辑与元信息（名称、订阅），
//! 以及处理结果到“确认 / 重投 / 丢弃”的映射。
//!
use crate::error::{DomainError, DomainResult};
use crate::eventing::BusMessage;
use async_trait::async_trait;

/// 订阅：通道名 + 主题
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub pubsub_name: String,
    pub topic: String,
}

impl Subscription {
    pub fn new(pubsub_name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            pubsub_name: pubsub_name.into(),
            topic: topic.into(),
        }
    }
}

/// 单次投递的处理结果，等价于 (retry, error) 二元组
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// 确认，不再投递
    Success,
    /// 瞬时失败，请求重投
    Retry(DomainError),
    /// 永久失败，不再重投（由引擎转入死信）
    Drop(DomainError),
}

impl DeliveryOutcome {
    /// 按错误分类：瞬时错误重投，其余丢弃
    pub fn from_result<T>(result: DomainResult<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) if err.is_transient() => Self::Retry(err),
            Err(err) => Self::Drop(err),
        }
    }

    pub fn retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            Self::Success => None,
            Self::Retry(err) | Self::Drop(err) => Some(err),
        }
    }
}

/// 主题处理器：处理某一订阅上的消息
#[async_trait]
pub trait TopicHandler: Send + Sync {
    /// 处理器名称（用于死信与日志）
    fn handler_name(&self) -> &str;
    /// 该处理器的订阅
    fn subscription(&self) -> &Subscription;
    /// 处理一次投递
    async fn handle(&self, message: &BusMessage) -> DeliveryOutcome;
}
