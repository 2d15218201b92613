//! 认捐事件（PledgeEvent）
//!
//! 一次认捐的不可变事实。线上格式沿用发布方的 PascalCase 字段名，
//! `EventId` 为可选的幂等键：缺省时该事件不参与去重。
//! 载荷缺少 `Time` 时取总线消息的发布时间，同一消息重投时解码结果不变。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::eventing::BusMessage;
use crate::value_object::CampaignId;

const TIME_FIELD: &str = "Time";

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PledgeEvent {
    /// 幂等键
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    event_id: Option<String>,
    /// 所属募捐活动
    campaign_id: CampaignId,
    /// 认捐时间
    #[builder(default = Utc::now())]
    time: DateTime<Utc>,
    /// 捐赠者展示名
    #[builder(into)]
    donor: String,
    /// 金额（不校验正负）
    amount: f64,
    /// 币种代码（自由格式）
    #[builder(into)]
    currency: String,
}

impl PledgeEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign_id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn donor(&self) -> &str {
        &self.donor
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// 从总线载荷解码；任何结构错误都归类为 `MalformedPayload`
    pub fn decode(data: &Value) -> DomainResult<Self> {
        Self::deserialize(data).map_err(|e| DomainError::malformed(e.to_string()))
    }

    /// 从总线消息解码；载荷缺少 `Time` 时使用消息的发布时间
    pub fn from_message(message: &BusMessage) -> DomainResult<Self> {
        match message.data() {
            Value::Object(fields) if !fields.contains_key(TIME_FIELD) => {
                let mut fields = fields.clone();
                fields.insert(
                    TIME_FIELD.to_string(),
                    serde_json::to_value(message.published_at())?,
                );
                Self::decode(&Value::Object(fields))
            }
            data => Self::decode(data),
        }
    }

    pub fn to_value(&self) -> DomainResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_publisher_payload() {
        let data = json!({
            "CampaignId": "1000",
            "Time": "2024-05-01T10:00:00Z",
            "Donor": "AB12 CDEFGHIJKL",
            "Amount": 125.0,
            "Currency": "EUR"
        });

        let event = PledgeEvent::decode(&data).unwrap();
        assert_eq!(event.campaign_id().as_str(), "1000");
        assert_eq!(event.donor(), "AB12 CDEFGHIJKL");
        assert_eq!(event.amount(), 125.0);
        assert_eq!(event.currency(), "EUR");
        assert_eq!(event.event_id(), None);
        assert_eq!(event.time().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn missing_time_is_taken_from_the_bus_message() {
        let message = BusMessage::builder()
            .pubsub_name("campaign-pubsub")
            .topic("pledge-topic")
            .published_at("2024-05-01T10:00:00Z".parse().unwrap())
            .data(json!({
                "CampaignId": "1001",
                "Donor": "A B",
                "Amount": 10,
                "Currency": "USD"
            }))
            .build();

        let first = PledgeEvent::from_message(&message).unwrap();
        let redelivered = PledgeEvent::from_message(&message).unwrap();
        assert_eq!(first.time(), message.published_at());
        assert_eq!(first, redelivered);

        // 载荷自带时间时以载荷为准
        let stamped = BusMessage::builder()
            .pubsub_name("campaign-pubsub")
            .topic("pledge-topic")
            .data(json!({
                "CampaignId": "1001",
                "Time": "2023-01-01T00:00:00Z",
                "Donor": "A B",
                "Amount": 10,
                "Currency": "USD"
            }))
            .build();
        let event = PledgeEvent::from_message(&stamped).unwrap();
        assert_eq!(event.time().to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }

    #[test]
    fn bare_payload_without_time_is_malformed() {
        let err = PledgeEvent::decode(&json!({
            "CampaignId": "1001",
            "Donor": "A B",
            "Amount": 10,
            "Currency": "USD"
        }))
        .unwrap_err();
        assert!(matches!(err, DomainError::MalformedPayload { .. }));
    }

    #[test]
    fn malformed_payloads_are_classified() {
        let cases = [
            json!("not an object"),
            json!({ "CampaignId": "1000", "Donor": "A B", "Currency": "USD" }),
            json!({ "CampaignId": "", "Donor": "A B", "Amount": 1, "Currency": "USD" }),
            json!({ "CampaignId": "1000", "Donor": "A B", "Amount": "ten", "Currency": "USD" }),
        ];

        for data in cases {
            match PledgeEvent::decode(&data).unwrap_err() {
                DomainError::MalformedPayload { .. } => {}
                other => panic!("unexpected {other:?} for {data}"),
            }
        }
    }

    #[test]
    fn wire_format_keeps_event_id() {
        let event = PledgeEvent::builder()
            .event_id("evt-1")
            .campaign_id(CampaignId::new("1002").unwrap())
            .donor("C D")
            .amount(50.0)
            .currency("USD")
            .build();

        let value = event.to_value().unwrap();
        assert_eq!(value["EventId"], "evt-1");
        assert_eq!(value["CampaignId"], "1002");
        assert_eq!(PledgeEvent::decode(&value).unwrap(), event);
    }
}
