use flux_config::SweepConfig;
use flux_track::{DigitCode, SweepPolicy};

/// 由配置生成扫描策略
pub fn sweep_policy(config: &SweepConfig) -> SweepPolicy {
    SweepPolicy {
        remove_after: config.remove_after_secs,
        remove_after_motion: config.remove_after_motion_secs,
        tag_after: config
            .tag()
            .map(|(secs, color)| (secs, DigitCode::from(color))),
        tag_after_motion: config
            .tag_motion()
            .map(|(secs, color)| (secs, DigitCode::from(color))),
        tiers: config
            .tiers
            .iter()
            .map(|tier| (tier.after_secs, DigitCode::from(tier.color)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_config::TierConfig;

    #[test]
    fn test_sweep_policy_from_config() {
        let config = SweepConfig {
            remove_after_secs: Some(3600),
            tag_after_secs: Some(120),
            tag_color: Some(12),
            tiers: vec![
                TierConfig { after_secs: 300, color: 2 },
                TierConfig { after_secs: 60, color: 1 },
            ],
            ..Default::default()
        };

        let policy = sweep_policy(&config);
        assert_eq!(policy.remove_after, Some(3600));
        assert_eq!(policy.remove_after_motion, None);
        assert_eq!(policy.tag_after, Some((120, DigitCode::from(12u32))));
        assert_eq!(policy.tag_after_motion, None);
        assert_eq!(
            policy.tiers,
            vec![(300, DigitCode::from(2u32)), (60, DigitCode::from(1u32))]
        );
    }

    #[test]
    fn test_default_config_gives_empty_policy() {
        assert_eq!(sweep_policy(&SweepConfig::default()), SweepPolicy::default());
    }
}
