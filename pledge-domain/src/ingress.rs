//! 认捐入口处理器（PledgeIngressHandler）
//!
//! 订阅认捐主题，把每次投递解码为 `PledgeEvent` 并交给 `ActorRuntime`：
//! - 解码失败：记录并丢弃（由引擎转入死信），不触碰任何状态；
//! - 已应用或重复：确认；
//! - 其他错误：按瞬时/永久分类请求重投或丢弃。
//!
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::campaign::ApplyOutcome;
use crate::eventing::{BusMessage, DeliveryOutcome, Subscription, TopicHandler};
use crate::pledge_event::PledgeEvent;
use crate::runtime::ActorRuntime;

pub const PLEDGE_INGRESS_HANDLER: &str = "pledge-ingress";

pub struct PledgeIngressHandler {
    name: String,
    subscription: Subscription,
    runtime: Arc<ActorRuntime>,
}

impl PledgeIngressHandler {
    pub fn new(subscription: Subscription, runtime: Arc<ActorRuntime>) -> Self {
        Self {
            name: PLEDGE_INGRESS_HANDLER.to_string(),
            subscription,
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<ActorRuntime> {
        &self.runtime
    }
}

#[async_trait]
impl TopicHandler for PledgeIngressHandler {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    async fn handle(&self, message: &BusMessage) -> DeliveryOutcome {
        let event = match PledgeEvent::from_message(message) {
            Ok(event) => event,
            Err(err) => {
                warn!(message_id = message.id(), error = %err, "undecodable pledge, dropping");
                return DeliveryOutcome::Drop(err);
            }
        };

        match self.runtime.apply_pledge(&event).await {
            Ok(ApplyOutcome::Applied { pledges }) => {
                info!(
                    campaign_id = %event.campaign_id(),
                    donor = event.donor(),
                    amount = event.amount(),
                    currency = event.currency(),
                    pledges,
                    "pledge applied"
                );
                DeliveryOutcome::Success
            }
            Ok(ApplyOutcome::Duplicate) => {
                debug!(
                    campaign_id = %event.campaign_id(),
                    event_id = event.event_id(),
                    "duplicate pledge acknowledged"
                );
                DeliveryOutcome::Success
            }
            Err(err) => {
                warn!(
                    campaign_id = %event.campaign_id(),
                    transient = err.is_transient(),
                    error = %err,
                    "pledge not applied"
                );
                DeliveryOutcome::from_result::<()>(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignConfig;
    use crate::error::{DomainError, DomainResult};
    use crate::persist::{InMemoryStateStore, SerializedState, StateStore};
    use crate::value_object::{ActorIdentity, CampaignId};
    use serde_json::{Value, json};

    struct UnavailableStore;

    #[async_trait]
    impl StateStore for UnavailableStore {
        async fn contains(&self, _: &ActorIdentity, _: &str) -> DomainResult<bool> {
            Err(DomainError::state_store("unavailable"))
        }
        async fn get(&self, _: &ActorIdentity, _: &str) -> DomainResult<Option<SerializedState>> {
            Err(DomainError::state_store("unavailable"))
        }
        async fn set(&self, _: &ActorIdentity, _: SerializedState) -> DomainResult<()> {
            Err(DomainError::state_store("unavailable"))
        }
        async fn save(&self, _: &ActorIdentity) -> DomainResult<()> {
            Err(DomainError::state_store("unavailable"))
        }
        async fn discard(&self, _: &ActorIdentity) -> DomainResult<()> {
            Err(DomainError::state_store("unavailable"))
        }
    }

    fn handler(store: Arc<dyn StateStore>) -> PledgeIngressHandler {
        let runtime = Arc::new(ActorRuntime::new(store, CampaignConfig::default()));
        PledgeIngressHandler::new(Subscription::new("campaign-pubsub", "pledge-topic"), runtime)
    }

    fn delivery(data: Value) -> BusMessage {
        BusMessage::builder()
            .pubsub_name("campaign-pubsub")
            .topic("pledge-topic")
            .data(data)
            .build()
    }

    #[tokio::test]
    async fn applies_and_acknowledges() {
        let store = InMemoryStateStore::new();
        let h = handler(Arc::new(store.clone()));
        let outcome = h
            .handle(&delivery(json!({
                "CampaignId": "1000",
                "Donor": "A B",
                "Amount": 100.0,
                "Currency": "USD"
            })))
            .await;
        assert!(matches!(outcome, DeliveryOutcome::Success));

        let snapshot = h
            .runtime()
            .snapshot(&CampaignId::new("1000").unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot.main.pledges(), 1);
        assert_eq!(snapshot.main.amount("USD"), Some(100.0));
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_state() {
        let store = InMemoryStateStore::new();
        let h = handler(Arc::new(store.clone()));

        for bad in [
            json!({ "Donor": "A B", "Amount": 1.0, "Currency": "USD" }),
            json!({ "CampaignId": "1000", "Donor": "A B", "Amount": "lots", "Currency": "USD" }),
            json!({ "CampaignId": "", "Donor": "A B", "Amount": 1.0, "Currency": "USD" }),
            json!("not an object"),
        ] {
            match h.handle(&delivery(bad)).await {
                DeliveryOutcome::Drop(DomainError::MalformedPayload { .. }) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(store.identities(), 0);
    }

    #[tokio::test]
    async fn duplicate_is_acknowledged() {
        let h = handler(Arc::new(InMemoryStateStore::new()));
        let data = json!({
            "EventId": "evt-1",
            "CampaignId": "1001",
            "Donor": "A B",
            "Amount": 5.0,
            "Currency": "EUR"
        });
        assert!(matches!(h.handle(&delivery(data.clone())).await, DeliveryOutcome::Success));
        assert!(matches!(h.handle(&delivery(data)).await, DeliveryOutcome::Success));

        let snapshot = h
            .runtime()
            .snapshot(&CampaignId::new("1001").unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot.main.pledges(), 1);
    }

    #[tokio::test]
    async fn redelivery_without_time_keeps_publish_time() {
        let h = handler(Arc::new(InMemoryStateStore::new()));
        let message = BusMessage::builder()
            .pubsub_name("campaign-pubsub")
            .topic("pledge-topic")
            .published_at("2024-05-01T10:00:00Z".parse().unwrap())
            .data(json!({
                "EventId": "evt-2",
                "CampaignId": "1002",
                "Donor": "A B",
                "Amount": 5.0,
                "Currency": "USD"
            }))
            .build();

        assert!(matches!(h.handle(&message).await, DeliveryOutcome::Success));
        assert!(matches!(h.handle(&message).await, DeliveryOutcome::Success));

        let snapshot = h
            .runtime()
            .snapshot(&CampaignId::new("1002").unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot.recent.len(), 1);
        assert_eq!(snapshot.recent.pledges()[0].time(), message.published_at());
    }

    #[tokio::test]
    async fn store_outage_requests_retry() {
        let h = handler(Arc::new(UnavailableStore));
        let outcome = h
            .handle(&delivery(json!({
                "CampaignId": "1000",
                "Donor": "A B",
                "Amount": 1.0,
                "Currency": "USD"
            })))
            .await;
        assert!(outcome.retry());
        assert!(matches!(outcome.error(), Some(DomainError::StateStore { .. })));
    }
}
