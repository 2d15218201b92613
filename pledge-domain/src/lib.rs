//! 募捐认捐聚合（pledge-domain）
//!
//! 以“每个募捐活动一个 Actor”的方式累计认捐事件：
//! - 认捐事件（`pledge_event`）与值对象（`value_object`）建模
//! - 活动状态与 Actor（`campaign`），按活动串行执行的运行时（`runtime`）
//! - 双记录原子提交、带版本的状态存储（`persist`）
//! - 事件系统（`eventing`）：总线、主题处理器、死信与订阅引擎
//! - 认捐入口处理器（`ingress`）与随机认捐生成器（`generator`）
//!
//! 存储与传输均以 trait 注入，内置内存实现，便于测试与本地运行。
//!
//! 典型用法：
//! 1. 创建 `InMemoryStateStore` 与 `InMemoryEventBus`；
//! 2. 以存储构建 `ActorRuntime`，并包装为 `PledgeIngressHandler`；
//! 3. 用 `SubscriptionEngine` 订阅认捐主题，配合死信接收端启动；
//! 4. 可选地启动 `PledgeGenerator` 持续产生认捐。
//!
pub mod campaign;
pub mod config;
pub mod error;
pub mod eventing;
pub mod generator;
pub mod ingress;
pub mod persist;
pub mod pledge_event;
pub mod runtime;
pub mod value_object;
