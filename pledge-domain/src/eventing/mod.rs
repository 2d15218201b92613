//! 事件子系统（eventing）
//!
//! 提供事件发布/订阅与处理的基础抽象与运行时：
//! - `EventBus`：统一发布/订阅接口，`InMemoryEventBus` 为进程内实现；
//! - `BusMessage`：总线上传输的消息信封；
//! - `TopicHandler`：对某一主题的消息进行消费处理，返回确认/重投/丢弃；
//! - `DeadLetterSink`：接收无法处理的消息；
//! - `SubscriptionEngine`：编排订阅与调度处理，并发执行、重投退避与死信。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod dead_letter;
pub mod engine;
pub mod handler;
pub mod message;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use dead_letter::{
    BusDeadLetterSink, DEAD_LETTER_HANDLER_KEY, DEAD_LETTER_REASON_KEY, DeadLetter,
    DeadLetterSink, InMemoryDeadLetters,
};
pub use engine::{EngineConfig, EngineHandle, RetryPolicy, SubscriptionEngine};
pub use handler::{DeliveryOutcome, Subscription, TopicHandler};
pub use message::BusMessage;
