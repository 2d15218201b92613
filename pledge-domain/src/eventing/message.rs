//! 总线消息（BusMessage）
//!
//! 发布/订阅通道上传输的标准形态：所属通道与主题、消息标识、发布时间、
//! 结构化载荷，以及可选的附加元数据（如死信原因）。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct BusMessage {
    /// 消息唯一标识
    #[builder(default = Uuid::now_v7().to_string())]
    id: String,
    /// 发布/订阅通道名
    #[builder(into)]
    pubsub_name: String,
    /// 主题
    #[builder(into)]
    topic: String,
    /// 发布时间
    #[builder(default = Utc::now())]
    published_at: DateTime<Utc>,
    /// 载荷
    data: Value,
    /// 附加元数据
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[builder(default)]
    metadata: BTreeMap<String, String>,
}

impl BusMessage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pubsub_name(&self) -> &str {
        &self.pubsub_name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// 以当前消息为原文，转投到另一主题（保留消息标识与元数据）
    pub fn forward_to(&self, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
