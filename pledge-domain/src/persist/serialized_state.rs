//! 状态记录的持久化形态（SerializedState）
//!
//! 与具体状态类型解耦的 JSON 记录，携带状态键与版本号，
//! 读取时校验状态键以避免把一条记录反序列化为错误的类型。
//!
use crate::{
    error::{DomainError, DomainResult as Result},
    value_object::Version,
};
use bon::Builder;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// 可由 Actor 持久化的状态切片
pub trait ActorState: Default + Serialize + DeserializeOwned + Send + Sync {
    /// 该状态在存储中的键
    const KEY: &'static str;

    /// 当前版本（已应用的事件数）
    fn version(&self) -> Version;
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SerializedState {
    #[builder(into)]
    state_key: String,
    version: Version,
    payload: Value,
}

impl SerializedState {
    pub fn state_key(&self) -> &str {
        &self.state_key
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 将记录反序列化为状态实例
    pub fn to_state<S>(&self) -> Result<S>
    where
        S: ActorState,
    {
        if S::KEY != self.state_key {
            return Err(DomainError::TypeMismatch {
                expected: S::KEY.to_string(),
                found: self.state_key.clone(),
            });
        }

        let state = serde_json::from_value(self.payload.clone())?;
        Ok(state)
    }

    /// 从状态实例创建记录
    pub fn from_state<S>(state: &S) -> Result<Self>
    where
        S: ActorState,
    {
        Ok(Self {
            state_key: S::KEY.to_string(),
            version: state.version(),
            payload: serde_json::to_value(state)?,
        })
    }
}
