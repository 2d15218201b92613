//! 状态持久化（persist）
//!
//! 定义 Actor 状态的存储协议与记录形态：
//! - `StateStore`：按 (Actor 身份, 状态键) 读写，缓冲 `set` + 原子 `save`；
//! - `StateStoreExt`：类型化读取（缺省即空默认值）与缓冲写入；
//! - `SerializedState`/`ActorState`：与具体状态类型解耦的 JSON 记录；
//! - `InMemoryStateStore`：内存实现，用于测试与本地运行。
//!
//! 具体存储后端由上层提供实现并注入。
//!
mod serialized_state;
mod state_store;
mod state_store_inmemory;

pub use serialized_state::{ActorState, SerializedState};
pub use state_store::{StateStore, StateStoreExt};
pub use state_store_inmemory::InMemoryStateStore;
