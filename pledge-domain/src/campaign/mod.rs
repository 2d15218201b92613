//! 募捐活动（campaign）
//!
//! 活动 Actor 及其两条状态记录：聚合计数（`main`）与最近认捐（`pledges`）。
//!
pub mod actor;
pub mod state;

pub use actor::{ApplyOutcome, CAMPAIGN_ACTOR_TYPE, CampaignActor, CampaignConfig};
pub use state::{
    CampaignAggregateState, CampaignRecentPledges, CampaignSnapshot, CampaignStats,
    CurrencyStats, CurrencyTally, MAIN_STATE_KEY, PLEDGES_STATE_KEY,
};
