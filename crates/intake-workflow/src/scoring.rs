//! 失误台账与评分引擎
//!
//! 评分时从记录字段重新推导全部失误，不依赖台账中阶段转换时追加的条目，
//! 因此重复评分不会重复计数。

use intake_core::{MistakeEntry, PatientRecord, Rank};
use serde::{Deserialize, Serialize};

use crate::names::NameMatcher;
use crate::validation::{Validator, DEFAULT_DATA_ENTRY_CEILING};

/// 评分策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// 失误点数不超过该值为 perfect
    pub perfect_max: u32,
    /// 失误点数不超过该值为 warning
    pub warning_max: u32,
    pub perfect_delta: i32,
    pub warning_delta: i32,
    pub bad_delta: i32,
    /// 每跳过一位排队患者的扣分
    pub skip_penalty_per_position: u32,
    /// 打字录入扣分上限
    pub data_entry_ceiling: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            perfect_max: 5,
            warning_max: 15,
            perfect_delta: 40,
            warning_delta: 20,
            bad_delta: -10,
            skip_penalty_per_position: 10,
            data_entry_ceiling: DEFAULT_DATA_ENTRY_CEILING,
        }
    }
}

/// 评分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub rank: Rank,
    pub score_delta: i32,
    pub total_mistake_points: u32,
    pub mistake_log: Vec<MistakeEntry>,
}

/// 跳号扣分后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipAdjustment {
    pub queue_position: usize,
    pub skip_penalty: u32,
    pub score_delta: i32,
}

/// 评分引擎
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
    validator: Validator,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        let validator = Validator::new(policy.data_entry_ceiling);
        Self { policy, validator }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// 按失误点数确定评级和基础得分
    pub fn rank_for(&self, total_mistake_points: u32) -> (Rank, i32) {
        if total_mistake_points <= self.policy.perfect_max {
            (Rank::Perfect, self.policy.perfect_delta)
        } else if total_mistake_points <= self.policy.warning_max {
            (Rank::Warning, self.policy.warning_delta)
        } else {
            (Rank::Bad, self.policy.bad_delta)
        }
    }

    /// 评分
    ///
    /// 可推导的失误由当前字段重新校验得到，手动记录的条目原样保留。
    /// 不修改记录。
    pub fn evaluate(&self, record: &PatientRecord, names: &dyn NameMatcher) -> Evaluation {
        let mut mistake_log = self.validator.validate_all(record, names);
        mistake_log.extend(
            record
                .mistake_log()
                .iter()
                .filter(|entry| !entry.source.is_derivable())
                .cloned(),
        );

        let total_mistake_points = mistake_log
            .iter()
            .filter(|entry| entry.is_mistake)
            .map(|entry| entry.points)
            .sum();
        let (rank, score_delta) = self.rank_for(total_mistake_points);

        Evaluation {
            rank,
            score_delta,
            total_mistake_points,
            mistake_log,
        }
    }

    /// 跳号扣分：10 × 排队位置
    pub fn compute_skip_penalty(&self, queue_position: usize) -> u32 {
        self.policy.skip_penalty_per_position * queue_position as u32
    }

    /// 仅在基础得分为正时扣分，且不低于 0
    pub fn apply_skip_penalty(&self, base_delta: i32, queue_position: usize) -> SkipAdjustment {
        if base_delta <= 0 {
            return SkipAdjustment {
                queue_position,
                skip_penalty: 0,
                score_delta: base_delta,
            };
        }

        let skip_penalty = self.compute_skip_penalty(queue_position);
        SkipAdjustment {
            queue_position,
            skip_penalty,
            score_delta: (base_delta - skip_penalty as i32).max(0),
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}
