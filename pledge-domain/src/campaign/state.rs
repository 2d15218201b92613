//! 募捐活动的两条状态记录
//!
//! - `CampaignAggregateState`（键 `main`）：认捐计数与按币种累计金额；
//! - `CampaignRecentPledges`（键 `pledges`）：有界的最近认捐序列。
//!
//! 两条记录各自独立存储，但由同一次 `save` 提交，版本号始终一致。
//!
use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::persist::ActorState;
use crate::pledge_event::PledgeEvent;
use crate::value_object::{CampaignId, Version};

pub const MAIN_STATE_KEY: &str = "main";
pub const PLEDGES_STATE_KEY: &str = "pledges";

/// 单一币种的认捐笔数与最大单笔
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTally {
    pub count: u64,
    pub largest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAggregateState {
    name: String,
    version: Version,
    pledges: u64,
    amounts: BTreeMap<String, f64>,
    #[serde(default)]
    tallies: BTreeMap<String, CurrencyTally>,
    #[serde(default)]
    last_donor: Option<String>,
    /// 最近已应用事件的幂等键，按应用顺序，长度受去重窗口约束
    #[serde(default)]
    applied_event_ids: VecDeque<String>,
}

impl Default for CampaignAggregateState {
    fn default() -> Self {
        Self {
            name: "Main State".to_string(),
            version: Version::new(),
            pledges: 0,
            amounts: BTreeMap::new(),
            tallies: BTreeMap::new(),
            last_donor: None,
            applied_event_ids: VecDeque::new(),
        }
    }
}

impl ActorState for CampaignAggregateState {
    const KEY: &'static str = MAIN_STATE_KEY;

    fn version(&self) -> Version {
        self.version
    }
}

impl CampaignAggregateState {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pledges(&self) -> u64 {
        self.pledges
    }

    pub fn amounts(&self) -> &BTreeMap<String, f64> {
        &self.amounts
    }

    pub fn amount(&self, currency: &str) -> Option<f64> {
        self.amounts.get(currency).copied()
    }

    pub fn tallies(&self) -> &BTreeMap<String, CurrencyTally> {
        &self.tallies
    }

    pub fn last_donor(&self) -> Option<&str> {
        self.last_donor.as_deref()
    }

    pub fn has_applied(&self, event_id: &str) -> bool {
        self.applied_event_ids.iter().any(|id| id == event_id)
    }

    /// 应用一笔认捐：计数加一，按币种累加金额，并记住幂等键
    pub fn apply(&mut self, event: &PledgeEvent, dedup_window: usize) {
        self.pledges += 1;
        *self
            .amounts
            .entry(event.currency().to_string())
            .or_insert(0.0) += event.amount();

        let tally = self
            .tallies
            .entry(event.currency().to_string())
            .or_default();
        if tally.count == 0 || event.amount() > tally.largest {
            tally.largest = event.amount();
        }
        tally.count += 1;

        self.last_donor = Some(event.donor().to_string());

        if let Some(id) = event.event_id()
            && dedup_window > 0
        {
            self.applied_event_ids.push_back(id.to_string());
            while self.applied_event_ids.len() > dedup_window {
                self.applied_event_ids.pop_front();
            }
        }

        self.version = self.version.next();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecentPledges {
    name: String,
    version: Version,
    pledges: VecDeque<PledgeEvent>,
}

impl Default for CampaignRecentPledges {
    fn default() -> Self {
        Self {
            name: "Pledges State".to_string(),
            version: Version::new(),
            pledges: VecDeque::new(),
        }
    }
}

impl ActorState for CampaignRecentPledges {
    const KEY: &'static str = PLEDGES_STATE_KEY;

    fn version(&self) -> Version {
        self.version
    }
}

impl CampaignRecentPledges {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pledges(&self) -> &VecDeque<PledgeEvent> {
        &self.pledges
    }

    pub fn len(&self) -> usize {
        self.pledges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pledges.is_empty()
    }

    /// 追加到尾部；超出容量时从头部淘汰最旧的认捐
    pub fn push(&mut self, event: PledgeEvent, capacity: usize) {
        self.pledges.push_back(event);
        while self.pledges.len() > capacity {
            self.pledges.pop_front();
        }
        self.version = self.version.next();
    }
}

/// 某一活动在同一轮次内读取到的两条记录
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSnapshot {
    pub campaign_id: CampaignId,
    pub main: CampaignAggregateState,
    pub recent: CampaignRecentPledges,
}

/// 单一币种的统计值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyStats {
    pub total: f64,
    pub count: u64,
    pub average: f64,
    pub largest: f64,
}

/// 募捐活动统计视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub pledges: u64,
    pub by_currency: BTreeMap<String, CurrencyStats>,
    pub last_donor: Option<String>,
}

impl CampaignSnapshot {
    pub fn stats(&self) -> CampaignStats {
        let by_currency = self
            .main
            .amounts()
            .iter()
            .map(|(currency, total)| {
                let tally = self.main.tallies().get(currency).cloned().unwrap_or_default();
                let average = if tally.count == 0 {
                    0.0
                } else {
                    total / tally.count as f64
                };
                let stats = CurrencyStats {
                    total: *total,
                    count: tally.count,
                    average,
                    largest: tally.largest,
                };
                (currency.clone(), stats)
            })
            .collect();

        CampaignStats {
            campaign_id: self.campaign_id.clone(),
            pledges: self.main.pledges(),
            by_currency,
            last_donor: self.main.last_donor().map(str::to_string),
        }
    }
}
