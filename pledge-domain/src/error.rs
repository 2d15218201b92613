//! 领域层统一错误定义
//!
//! 聚焦序列化、事件总线、状态存储与命令校验等最小必要集合，
//! 并区分瞬时错误（可重试）与永久错误（应丢弃或进入死信）。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/解码 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },

    // --- 状态存储 ---
    #[error("state store error: {reason}")]
    StateStore { reason: String },
    #[error("version conflict: campaign={campaign_id}, main={main}, pledges={pledges}")]
    VersionConflict {
        campaign_id: String,
        main: usize,
        pledges: usize,
    },

    // --- 命令与取值校验 ---
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error("invalid campaign id: {0:?}")]
    InvalidCampaignId(String),
}

impl DomainError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn state_store(reason: impl Into<String>) -> Self {
        Self::StateStore {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// 是否为瞬时错误（存储或传输暂不可用），重试可能成功
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StateStore { .. } | Self::EventBus { .. })
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
