//! 流水线配置（PipelineConfig）
//!
//! 汇总总线命名、Actor 状态、订阅引擎与生成器的配置，均带默认值。
//!
use crate::campaign::CampaignConfig;
use crate::eventing::EngineConfig;
use crate::generator::GeneratorConfig;

pub const DEFAULT_PUBSUB_NAME: &str = "campaign-pubsub";
pub const DEFAULT_TOPIC: &str = "pledge-topic";
pub const DEFAULT_DEAD_LETTER_TOPIC: &str = "pledge-topic-deadletter";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub pubsub_name: String,
    pub topic: String,
    pub dead_letter_topic: String,
    /// 每个主题的总线缓冲容量
    pub bus_capacity: usize,
    pub campaign: CampaignConfig,
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pubsub_name: DEFAULT_PUBSUB_NAME.into(),
            topic: DEFAULT_TOPIC.into(),
            dead_letter_topic: DEFAULT_DEAD_LETTER_TOPIC.into(),
            bus_capacity: 1024,
            campaign: CampaignConfig::default(),
            engine: EngineConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_names() {
        let config = PipelineConfig::default();
        assert_eq!(config.pubsub_name, "campaign-pubsub");
        assert_eq!(config.topic, "pledge-topic");
        assert_eq!(config.dead_letter_topic, "pledge-topic-deadletter");
        assert_eq!(config.campaign.recent_capacity, 10);
        assert_eq!(config.engine.retry.max_retries, 3);
        assert_eq!(config.generator.campaign_ids, ["1000", "1001", "1002"]);
        assert!(config.generator.validate().is_ok());
    }
}
