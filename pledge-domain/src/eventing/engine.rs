//! 订阅引擎（SubscriptionEngine）
//!
//! 统一编排“订阅 → 分发处理 → 重投/死信”的长驻任务：
//! - 每个主题一个订阅循环，按处理器订阅分发消息；
//! - 以信号量限制并发投递数，处理器并发度为 1 时保持主题内顺序；
//! - 处理器请求重投时按 `RetryPolicy` 退避重试，耗尽后转入死信；
//! - 处理器丢弃的消息直接转入死信；
//! - 提供关闭与等待的 `EngineHandle`，关闭时等待在途投递结束。
//!
use super::{BusMessage, DeadLetterSink, DeliveryOutcome, EventBus, TopicHandler};
use crate::error::DomainResult;
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::subscription_engine_builder::{IsUnset, SetRegistry, State as BuilderState};

/// SubscriptionEngine：
/// - 订阅 Bus 上各处理器关心的主题
/// - 分发到匹配的 Handler，并发处理，按策略重投或转入死信
#[derive(Builder)]
pub struct SubscriptionEngine {
    event_bus: Arc<dyn EventBus>,
    dead_letters: Arc<dyn DeadLetterSink>,
    #[builder(setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: EngineConfig,
}

impl<S: BuilderState> SubscriptionEngineBuilder<S> {
    pub fn topic_handlers(
        self,
        handlers: Vec<Arc<dyn TopicHandler>>,
    ) -> SubscriptionEngineBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(HandlerRegistry::new(handlers))
    }
}

impl SubscriptionEngine {
    /// 启动订阅引擎：先完成全部主题的订阅，再派生订阅循环。
    /// 返回后发布到已订阅主题的消息都会被投递。
    pub async fn start(self: Arc<Self>) -> EngineHandle {
        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for (topic, handlers) in self.registry.by_topic.iter() {
            let stream = self.event_bus.subscribe(topic).await;
            info!(
                pubsub = self.event_bus.pubsub_name(),
                topic = %topic,
                handlers = handlers.len(),
                "subscription started"
            );
            tasks.push(tokio::spawn(Self::subscribe_loop(
                self.clone(),
                token.clone(),
                topic.clone(),
                stream,
                handlers.clone(),
            )));
        }

        EngineHandle { token, tasks }
    }

    async fn subscribe_loop(
        self: Arc<Self>,
        token: CancellationToken,
        topic: String,
        mut stream: BoxStream<'static, DomainResult<BusMessage>>,
        handlers: Vec<Arc<dyn TopicHandler>>,
    ) {
        let permits = Arc::new(Semaphore::new(self.config.handler_concurrency.max(1)));
        let mut inflight: JoinSet<()> = JoinSet::new();

        loop {
            while inflight.try_join_next().is_some() {}

            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                maybe_message = stream.next() => {
                    match maybe_message {
                        Some(Ok(message)) => {
                            let Ok(permit) = permits.clone().acquire_owned().await else {
                                break;
                            };
                            let engine = self.clone();
                            let handlers = handlers.clone();
                            let token = token.clone();
                            inflight.spawn(async move {
                                for h in handlers {
                                    engine.deliver(h, &message, &token).await;
                                }
                                drop(permit);
                            });
                        }
                        Some(Err(err)) => {
                            warn!(topic = %topic, error = %err, "subscription stream error, continuing");
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }

        // 不取消在途投递，等待其自然结束
        while inflight.join_next().await.is_some() {}
        debug!(topic = %topic, "subscription stopped");
    }

    async fn deliver(
        &self,
        handler: Arc<dyn TopicHandler>,
        message: &BusMessage,
        token: &CancellationToken,
    ) {
        let policy = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match handler.handle(message).await {
                DeliveryOutcome::Success => return,
                DeliveryOutcome::Drop(err) => {
                    self.dead_letter(handler.as_ref(), message, &err.to_string())
                        .await;
                    return;
                }
                DeliveryOutcome::Retry(err) => err,
            };

            if !policy.allows_retry(attempt) {
                let reason = format!("{err} (gave up after {attempt} attempts)");
                self.dead_letter(handler.as_ref(), message, &reason).await;
                return;
            }

            let delay = policy.backoff(attempt);
            warn!(
                handler = handler.handler_name(),
                message_id = message.id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "delivery failed, retrying"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    let reason = format!("{err} (shutdown before retry {})", attempt + 1);
                    self.dead_letter(handler.as_ref(), message, &reason).await;
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn dead_letter(&self, handler: &dyn TopicHandler, message: &BusMessage, reason: &str) {
        if let Err(e) = self
            .dead_letters
            .dead_letter(handler.handler_name(), message, reason)
            .await
        {
            error!(
                handler = handler.handler_name(),
                message_id = message.id(),
                error = %e,
                "dead-letter sink failed, message lost"
            );
        }
    }
}

#[derive(Clone, Default)]
struct HandlerRegistry {
    by_topic: HashMap<String, Vec<Arc<dyn TopicHandler>>>,
}

impl HandlerRegistry {
    fn new(handlers: Vec<Arc<dyn TopicHandler>>) -> Self {
        let mut by_topic: HashMap<String, Vec<Arc<dyn TopicHandler>>> = HashMap::new();
        for h in handlers {
            by_topic
                .entry(h.subscription().topic.clone())
                .or_default()
                .push(h);
        }
        Self { by_topic }
    }
}

/// 重投策略：有限次数的指数退避
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// 首次失败后允许的最大重投次数，0 表示不重投
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// 不重投：任何失败都直接转入死信
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次（从 1 计）失败后是否还可以重投
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// 第 `attempt` 次失败后的退避时长
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let factor = self.multiplier.max(1.0).powi(exp);
        // 先在浮点秒上封顶，再转换回 Duration，避免乘法溢出
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if !(secs < self.max_backoff.as_secs_f64()) {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// 订阅引擎配置
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// 每个主题同时在途的投递数
    pub handler_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

/// 引擎运行句柄：用于优雅关闭与等待任务结束
pub struct EngineHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
