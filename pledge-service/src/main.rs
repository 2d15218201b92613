//! 认捐聚合服务入口
//!
//! 装配内存状态存储、内存总线、Actor 运行时、订阅引擎与生成器，
//! 运行至 Ctrl-C 后优雅关闭，并输出各活动的统计。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pledge_domain::campaign::CampaignConfig;
use pledge_domain::config::{
    DEFAULT_DEAD_LETTER_TOPIC, DEFAULT_PUBSUB_NAME, DEFAULT_TOPIC, PipelineConfig,
};
use pledge_domain::eventing::{
    BusDeadLetterSink, EngineConfig, EventBus, InMemoryEventBus, RetryPolicy, Subscription,
    SubscriptionEngine, TopicHandler,
};
use pledge_domain::generator::{GeneratorConfig, PledgeGenerator};
use pledge_domain::ingress::PledgeIngressHandler;
use pledge_domain::persist::InMemoryStateStore;
use pledge_domain::runtime::ActorRuntime;
use pledge_domain::value_object::CampaignId;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pub/sub component name
    #[arg(long, env = "PLEDGE_PUBSUB_NAME", default_value = DEFAULT_PUBSUB_NAME)]
    pubsub_name: String,

    /// Topic carrying pledge events
    #[arg(long, env = "PLEDGE_TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Topic receiving undeliverable pledges
    #[arg(long, env = "PLEDGE_DEAD_LETTER_TOPIC", default_value = DEFAULT_DEAD_LETTER_TOPIC)]
    dead_letter_topic: String,

    /// Per-topic bus buffer
    #[arg(long, env = "PLEDGE_BUS_CAPACITY", default_value_t = 1024)]
    bus_capacity: usize,

    /// Recent pledges kept per campaign
    #[arg(long, env = "PLEDGE_RECENT_CAPACITY", default_value_t = 10)]
    recent_capacity: usize,

    /// Applied event ids remembered per campaign (0 disables deduplication)
    #[arg(long, env = "PLEDGE_DEDUP_WINDOW", default_value_t = 256)]
    dedup_window: usize,

    /// Concurrent deliveries per topic
    #[arg(long, env = "PLEDGE_HANDLER_CONCURRENCY", default_value_t = 8)]
    handler_concurrency: usize,

    /// Retries after a transient failure (0 dead-letters immediately)
    #[arg(long, env = "PLEDGE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// First retry backoff in milliseconds
    #[arg(long, env = "PLEDGE_RETRY_BACKOFF_MS", default_value_t = 200)]
    retry_backoff_ms: u64,

    /// Generator period in milliseconds
    #[arg(long, env = "PLEDGE_INTERVAL_MS", default_value_t = 5000)]
    interval_ms: u64,

    /// Campaign ids the generator picks from
    #[arg(long, env = "PLEDGE_CAMPAIGNS", value_delimiter = ',', default_value = "1000,1001,1002")]
    campaigns: Vec<String>,

    /// Currencies the generator picks from
    #[arg(long, env = "PLEDGE_CURRENCIES", value_delimiter = ',', default_value = "USD,EUR")]
    currencies: Vec<String>,

    /// Smallest generated amount
    #[arg(long, env = "PLEDGE_MIN_AMOUNT", default_value_t = 10)]
    min_amount: u32,

    /// Generated amounts stay below this
    #[arg(long, env = "PLEDGE_MAX_AMOUNT", default_value_t = 1000)]
    max_amount: u32,

    /// Fixed RNG seed for reproducible load
    #[arg(long, env = "PLEDGE_SEED")]
    seed: Option<u64>,

    /// Run the subscriber only, without generating pledges
    #[arg(long, env = "PLEDGE_NO_GENERATOR")]
    no_generator: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            pubsub_name: self.pubsub_name.clone(),
            topic: self.topic.clone(),
            dead_letter_topic: self.dead_letter_topic.clone(),
            bus_capacity: self.bus_capacity,
            campaign: CampaignConfig {
                recent_capacity: self.recent_capacity,
                dedup_window: self.dedup_window,
            },
            engine: EngineConfig {
                handler_concurrency: self.handler_concurrency,
                retry: RetryPolicy {
                    max_retries: self.max_retries,
                    initial_backoff: Duration::from_millis(self.retry_backoff_ms),
                    ..defaults.engine.retry
                },
            },
            generator: GeneratorConfig {
                interval: Duration::from_millis(self.interval_ms),
                campaign_ids: self.campaigns.clone(),
                min_amount: self.min_amount,
                max_amount: self.max_amount,
                currencies: self.currencies.clone(),
                seed: self.seed,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.pipeline_config();
    info!(version = env!("CARGO_PKG_VERSION"), ?config, "starting pledge service");

    let store = Arc::new(InMemoryStateStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(
        config.pubsub_name.clone(),
        config.bus_capacity,
    ));
    let runtime = Arc::new(ActorRuntime::new(store, config.campaign));

    let ingress: Arc<dyn TopicHandler> = Arc::new(PledgeIngressHandler::new(
        Subscription::new(config.pubsub_name.clone(), config.topic.clone()),
        runtime.clone(),
    ));
    let engine = Arc::new(
        SubscriptionEngine::builder()
            .event_bus(bus.clone())
            .dead_letters(Arc::new(BusDeadLetterSink::new(
                bus.clone(),
                config.dead_letter_topic.clone(),
            )))
            .topic_handlers(vec![ingress])
            .config(config.engine)
            .build(),
    );
    let engine_handle = engine.start().await;

    let token = CancellationToken::new();
    let generator = if args.no_generator {
        None
    } else {
        let generator = PledgeGenerator::new(bus.clone(), config.topic.clone(), config.generator.clone())
            .context("invalid generator configuration")?;
        Some(generator.spawn(token.clone()))
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown signal received");

    token.cancel();
    if let Some(generator) = generator
        && let Err(e) = generator.await
    {
        error!(error = %e, "generator task failed");
    }
    engine_handle.shutdown();
    engine_handle.join().await;

    for id in &config.generator.campaign_ids {
        let campaign_id = CampaignId::new(id.as_str())
            .with_context(|| format!("invalid campaign id {id:?}"))?;
        let snapshot = runtime
            .snapshot(&campaign_id)
            .await
            .with_context(|| format!("failed to read campaign {campaign_id}"))?;
        let stats = snapshot.stats();
        info!(
            campaign_id = %stats.campaign_id,
            pledges = stats.pledges,
            by_currency = ?stats.by_currency,
            last_donor = ?stats.last_donor,
            recent = snapshot.recent.len(),
            "campaign totals"
        );
    }

    info!("pledge service stopped");
    Ok(())
}
