//! 认捐生成器（PledgeGenerator）
//!
//! 按固定周期构造随机认捐并发布到总线，用于本地演示与压测。
//! 发布失败只记录日志，不重试，生成器继续运行；取消后在计时等待与发布处及时退出。
//!
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::{BusMessage, EventBus};
use crate::pledge_event::PledgeEvent;
use crate::value_object::CampaignId;

const DONOR_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 生成器配置
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub interval: Duration,
    pub campaign_ids: Vec<String>,
    /// 金额下界（含）
    pub min_amount: u32,
    /// 金额上界（不含）
    pub max_amount: u32,
    pub currencies: Vec<String>,
    /// 固定随机种子，便于复现
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            campaign_ids: vec!["1000".into(), "1001".into(), "1002".into()],
            min_amount: 10,
            max_amount: 1000,
            currencies: vec!["USD".into(), "EUR".into()],
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<Vec<CampaignId>> {
        if self.interval.is_zero() {
            return Err(DomainError::InvalidValue {
                reason: "generator interval must be positive".into(),
            });
        }
        if self.min_amount >= self.max_amount {
            return Err(DomainError::InvalidValue {
                reason: format!(
                    "empty amount range [{}, {})",
                    self.min_amount, self.max_amount
                ),
            });
        }
        if self.currencies.is_empty() {
            return Err(DomainError::InvalidValue {
                reason: "at least one currency is required".into(),
            });
        }
        if self.campaign_ids.is_empty() {
            return Err(DomainError::InvalidValue {
                reason: "at least one campaign id is required".into(),
            });
        }
        self.campaign_ids.iter().map(CampaignId::new).collect()
    }
}

pub struct PledgeGenerator {
    bus: Arc<dyn EventBus>,
    topic: String,
    config: GeneratorConfig,
    campaigns: Vec<CampaignId>,
    rng: StdRng,
}

impl PledgeGenerator {
    pub fn new(
        bus: Arc<dyn EventBus>,
        topic: impl Into<String>,
        config: GeneratorConfig,
    ) -> Result<Self> {
        let campaigns = config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            bus,
            topic: topic.into(),
            config,
            campaigns,
            rng,
        })
    }

    /// 构造下一条随机认捐
    pub fn next_event(&mut self) -> PledgeEvent {
        let campaign_id = self
            .campaigns
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| self.campaigns[0].clone());
        let currency = self
            .config
            .currencies
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();
        let donor = format!("{} {}", self.random_word(4), self.random_word(10));
        let amount = self
            .rng
            .gen_range(self.config.min_amount..self.config.max_amount);

        PledgeEvent::builder()
            .event_id(Uuid::now_v7().to_string())
            .campaign_id(campaign_id)
            .donor(donor)
            .amount(f64::from(amount))
            .currency(currency)
            .build()
    }

    fn random_word(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| DONOR_CHARSET[self.rng.gen_range(0..DONOR_CHARSET.len())] as char)
            .collect()
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(mut self, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            topic = %self.topic,
            interval_ms = self.config.interval.as_millis() as u64,
            "pledge generator started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let event = self.next_event();
            let message = match event.to_value() {
                Ok(data) => BusMessage::builder()
                    .pubsub_name(self.bus.pubsub_name())
                    .topic(self.topic.clone())
                    .data(data)
                    .build(),
                Err(err) => {
                    warn!(error = %err, "failed to encode pledge");
                    continue;
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                published = self.bus.publish(&message) => match published {
                    Ok(()) => debug!(
                        campaign_id = %event.campaign_id(),
                        donor = event.donor(),
                        amount = event.amount(),
                        currency = event.currency(),
                        "pledge published"
                    ),
                    Err(err) => warn!(
                        campaign_id = %event.campaign_id(),
                        error = %err,
                        "failed to publish pledge"
                    ),
                },
            }
        }

        info!(topic = %self.topic, "pledge generator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::InMemoryEventBus;
    use async_trait::async_trait;
    use futures_core::stream::BoxStream;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 每次发布都失败并计数的总线
    #[derive(Default)]
    struct UnreachableBus {
        publishes: AtomicUsize,
    }

    #[async_trait]
    impl EventBus for UnreachableBus {
        fn pubsub_name(&self) -> &str {
            "campaign-pubsub"
        }

        async fn publish(&self, _message: &BusMessage) -> Result<()> {
            self.publishes.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::event_bus("broker unreachable"))
        }

        async fn subscribe(&self, _topic: &str) -> BoxStream<'static, Result<BusMessage>> {
            Box::pin(futures_util::stream::empty::<Result<BusMessage>>())
        }
    }

    fn bus() -> Arc<InMemoryEventBus> {
        Arc::new(InMemoryEventBus::new("campaign-pubsub", 64))
    }

    #[test]
    fn rejects_unusable_config() {
        let empty_range = GeneratorConfig {
            min_amount: 10,
            max_amount: 10,
            ..GeneratorConfig::default()
        };
        assert!(matches!(
            empty_range.validate(),
            Err(DomainError::InvalidValue { .. })
        ));

        let no_currency = GeneratorConfig {
            currencies: vec![],
            ..GeneratorConfig::default()
        };
        assert!(no_currency.validate().is_err());

        let bad_id = GeneratorConfig {
            campaign_ids: vec![" 1000".into()],
            ..GeneratorConfig::default()
        };
        assert!(matches!(
            bad_id.validate(),
            Err(DomainError::InvalidCampaignId(_))
        ));
    }

    #[tokio::test]
    async fn generated_pledges_stay_in_bounds() {
        let config = GeneratorConfig {
            seed: Some(7),
            ..GeneratorConfig::default()
        };
        let mut generator = PledgeGenerator::new(bus(), "pledge-topic", config).unwrap();

        let mut ids = std::collections::HashSet::new();
        for _ in 0..200 {
            let event = generator.next_event();
            assert!(["1000", "1001", "1002"].contains(&event.campaign_id().as_str()));
            assert!(["USD", "EUR"].contains(&event.currency()));
            assert!((10.0..1000.0).contains(&event.amount()));
            assert_eq!(event.amount().fract(), 0.0);

            let words: Vec<&str> = event.donor().split(' ').collect();
            assert_eq!(words.len(), 2);
            assert_eq!(words[0].len(), 4);
            assert_eq!(words[1].len(), 10);
            assert!(
                event
                    .donor()
                    .chars()
                    .all(|c| c == ' ' || c.is_ascii_uppercase() || c.is_ascii_digit())
            );

            assert!(ids.insert(event.event_id().unwrap().to_string()));
        }
    }

    #[tokio::test]
    async fn same_seed_reproduces_pledges() {
        let config = GeneratorConfig {
            seed: Some(42),
            ..GeneratorConfig::default()
        };
        let mut a = PledgeGenerator::new(bus(), "pledge-topic", config.clone()).unwrap();
        let mut b = PledgeGenerator::new(bus(), "pledge-topic", config).unwrap();
        for _ in 0..10 {
            let (x, y) = (a.next_event(), b.next_event());
            assert_eq!(x.campaign_id(), y.campaign_id());
            assert_eq!(x.donor(), y.donor());
            assert_eq!(x.amount(), y.amount());
            assert_eq!(x.currency(), y.currency());
        }
    }

    #[tokio::test]
    async fn publishes_until_cancelled() {
        let bus = bus();
        let mut stream = bus.subscribe("pledge-topic").await;
        let config = GeneratorConfig {
            interval: Duration::from_millis(10),
            seed: Some(1),
            ..GeneratorConfig::default()
        };
        let token = CancellationToken::new();
        let handle = PledgeGenerator::new(bus.clone(), "pledge-topic", config)
            .unwrap()
            .spawn(token.clone());

        let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event = PledgeEvent::from_message(&first).unwrap();
        assert!(event.event_id().is_some());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keeps_ticking_when_publish_fails() {
        let bus = Arc::new(UnreachableBus::default());
        let interval = Duration::from_millis(10);
        let config = GeneratorConfig {
            interval,
            seed: Some(3),
            ..GeneratorConfig::default()
        };
        let token = CancellationToken::new();
        let started = std::time::Instant::now();
        let handle = PledgeGenerator::new(bus.clone(), "pledge-topic", config)
            .unwrap()
            .spawn(token.clone());

        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            while bus.publishes.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        let elapsed = started.elapsed();

        let publishes = bus.publishes.load(Ordering::SeqCst);
        assert!(publishes >= 3, "generator stopped after a failed publish");
        // 每个周期至多一次发布：失败不重试
        let ticks = (elapsed.as_millis() / interval.as_millis()) as usize;
        assert!(publishes <= ticks, "{publishes} publishes in {ticks} ticks");
    }
}
