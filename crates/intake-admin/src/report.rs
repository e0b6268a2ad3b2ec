//! 班次报告
//!
//! 根据会话历史汇总成绩，输出纯文本或 JSON

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use intake_core::Rank;
use intake_workflow::{HistoryEntry, IntakeSession};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 报告中列出的高频失误条数
pub const TOP_MISTAKE_LIMIT: usize = 5;

/// 失误原因统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeFrequency {
    pub reason: String,
    pub count: usize,
    pub points: u32,
}

/// 班次汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub patients_finished: usize,
    pub cumulative_score: i64,
    pub rank_distribution: BTreeMap<Rank, usize>,
    pub total_mistake_points: u32,
    pub total_skip_penalty: u32,
    pub frequent_mistakes: Vec<MistakeFrequency>,
}

impl SessionSummary {
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        let mut rank_distribution = BTreeMap::new();
        let mut reasons: HashMap<&str, (usize, u32)> = HashMap::new();
        let mut total_mistake_points = 0;
        let mut total_skip_penalty = 0;
        let mut cumulative_score = 0i64;

        for entry in history {
            let outcome = &entry.outcome;
            *rank_distribution.entry(outcome.evaluation.rank).or_insert(0) += 1;
            total_mistake_points += outcome.evaluation.total_mistake_points;
            total_skip_penalty += outcome.skip_penalty;
            cumulative_score += i64::from(outcome.score_delta);

            for mistake in outcome.evaluation.mistake_log.iter().filter(|m| m.is_mistake) {
                let slot = reasons.entry(mistake.reason.as_str()).or_insert((0, 0));
                slot.0 += 1;
                slot.1 += mistake.points;
            }
        }

        let mut frequent_mistakes: Vec<MistakeFrequency> = reasons
            .into_iter()
            .map(|(reason, (count, points))| MistakeFrequency {
                reason: reason.to_string(),
                count,
                points,
            })
            .collect();
        frequent_mistakes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        frequent_mistakes.truncate(TOP_MISTAKE_LIMIT);

        Self {
            patients_finished: history.len(),
            cumulative_score,
            rank_distribution,
            total_mistake_points,
            total_skip_penalty,
            frequent_mistakes,
        }
    }

    pub fn rank_count(&self, rank: Rank) -> usize {
        self.rank_distribution.get(&rank).copied().unwrap_or(0)
    }
}

/// 班次报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// 报告生成时间
    pub generated_at: DateTime<Utc>,
    pub summary: SessionSummary,
    /// 尚未完成的患者数
    pub patients_waiting: usize,
    pub entries: Vec<HistoryEntry>,
}

impl SessionReport {
    pub fn from_session(session: &IntakeSession) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: SessionSummary::from_history(session.history()),
            patients_waiting: session.queue().len(),
            entries: session.history().to_vec(),
        }
    }

    /// 纯文本报告
    pub fn render_text(&self) -> String {
        let summary = &self.summary;
        let mut report = String::new();

        report.push_str("=== 班次汇总 ===\n");
        report.push_str(&format!("完成患者: {}\n", summary.patients_finished));
        report.push_str(&format!("等待患者: {}\n", self.patients_waiting));
        report.push_str(&format!("累计得分: {}\n", summary.cumulative_score));
        report.push_str(&format!("失误点数: {}\n", summary.total_mistake_points));
        report.push_str(&format!("跳号扣分: {}\n\n", summary.total_skip_penalty));

        report.push_str("=== 评级分布 ===\n");
        for rank in [Rank::Perfect, Rank::Warning, Rank::Bad] {
            report.push_str(&format!("{}: {}\n", rank, summary.rank_count(rank)));
        }
        report.push('\n');

        if !summary.frequent_mistakes.is_empty() {
            report.push_str("=== 常见失误 ===\n");
            for (i, mistake) in summary.frequent_mistakes.iter().enumerate() {
                report.push_str(&format!(
                    "{}. {} ×{} ({} 点)\n",
                    i + 1,
                    mistake.reason,
                    mistake.count,
                    mistake.points
                ));
            }
            report.push('\n');
        }

        if !self.entries.is_empty() {
            report.push_str("=== 患者明细 ===\n");
            for (i, entry) in self.entries.iter().enumerate() {
                let outcome = &entry.outcome;
                report.push_str(&format!(
                    "{}. #{} {} {} 失误 {} 点, 得分 {:+}",
                    i + 1,
                    outcome.reception_number,
                    entry.display_name,
                    outcome.evaluation.rank,
                    outcome.evaluation.total_mistake_points,
                    outcome.score_delta
                ));
                if outcome.skip_penalty > 0 {
                    report.push_str(&format!(" (跳号 -{})", outcome.skip_penalty));
                }
                report.push('\n');
            }
        }

        report
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize session report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{LedgerSource, MistakeEntry};
    use intake_workflow::{Evaluation, IntakeOutcome};
    use uuid::Uuid;

    fn entry(number: u32, rank: Rank, mistakes: &[(&str, u32)], skip_penalty: u32, score_delta: i32) -> HistoryEntry {
        let mistake_log: Vec<MistakeEntry> = mistakes
            .iter()
            .map(|(reason, points)| MistakeEntry {
                points: *points,
                reason: reason.to_string(),
                is_mistake: true,
                source: LedgerSource::Completion,
            })
            .collect();
        let total_mistake_points = mistake_log.iter().map(|m| m.points).sum();

        HistoryEntry::new(
            format!("患者{}", number),
            IntakeOutcome {
                patient_id: Uuid::new_v4(),
                reception_number: number,
                evaluation: Evaluation {
                    rank,
                    score_delta: score_delta + skip_penalty as i32,
                    total_mistake_points,
                    mistake_log,
                },
                queue_position: (skip_penalty / 10) as usize,
                skip_penalty,
                score_delta,
            },
        )
    }

    fn history() -> Vec<HistoryEntry> {
        vec![
            entry(3, Rank::Perfect, &[], 0, 40),
            entry(7, Rank::Warning, &[("urine mark missing", 10)], 10, 10),
            entry(
                9,
                Rank::Bad,
                &[("urine mark missing", 10), ("date stamp missing", 10), ("name mismatch", 10)],
                0,
                -10,
            ),
        ]
    }

    #[test]
    fn test_summary_from_history() {
        let summary = SessionSummary::from_history(&history());

        assert_eq!(summary.patients_finished, 3);
        assert_eq!(summary.cumulative_score, 40);
        assert_eq!(summary.total_mistake_points, 40);
        assert_eq!(summary.total_skip_penalty, 10);
        assert_eq!(summary.rank_count(Rank::Perfect), 1);
        assert_eq!(summary.rank_count(Rank::Warning), 1);
        assert_eq!(summary.rank_count(Rank::Bad), 1);

        assert_eq!(summary.frequent_mistakes[0].reason, "urine mark missing");
        assert_eq!(summary.frequent_mistakes[0].count, 2);
        assert_eq!(summary.frequent_mistakes[0].points, 20);
        assert_eq!(summary.frequent_mistakes.len(), 3);
    }

    #[test]
    fn test_empty_history() {
        let summary = SessionSummary::from_history(&[]);
        assert_eq!(summary.patients_finished, 0);
        assert_eq!(summary.cumulative_score, 0);
        assert!(summary.frequent_mistakes.is_empty());
    }

    #[test]
    fn test_text_and_json_rendering() {
        let entries = history();
        let report = SessionReport {
            generated_at: Utc::now(),
            summary: SessionSummary::from_history(&entries),
            patients_waiting: 2,
            entries,
        };

        let text = report.render_text();
        assert!(text.contains("=== 班次汇总 ==="));
        assert!(text.contains("累计得分: 40"));
        assert!(text.contains("1. urine mark missing ×2 (20 点)"));
        assert!(text.contains("#7 患者7 warning"));
        assert!(text.contains("(跳号 -10)"));

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["patients_finished"], 3);
        assert_eq!(value["summary"]["rank_distribution"]["perfect"], 1);
        assert_eq!(value["patients_waiting"], 2);
    }
}
