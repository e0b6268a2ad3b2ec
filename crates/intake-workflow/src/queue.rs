//! 接诊队列与历史记录
//!
//! 活动队列按加入顺序保存尚未完成的患者，完成后的结果转入只读历史

use chrono::{DateTime, Utc};
use intake_core::{IntakeError, IntakeStage, PatientRecord, Rank, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::scoring::Evaluation;

/// 活动队列
#[derive(Debug, Clone, Default)]
pub struct ActiveQueue {
    records: Vec<PatientRecord>,
}

impl ActiveQueue {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// 加入队尾
    pub fn push(&mut self, record: PatientRecord) {
        tracing::debug!("Patient {} (#{}) joined the queue", record.id(), record.reception_number());
        self.records.push(record);
    }

    pub fn get(&self, id: Uuid) -> Option<&PatientRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Result<&mut PatientRecord> {
        self.records
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or_else(|| IntakeError::NotFound(format!("Patient {} not in queue", id)))
    }

    /// 在队列中的位置，从 0 开始
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    /// 移出队列
    pub fn remove(&mut self, id: Uuid) -> Result<PatientRecord> {
        match self.position(id) {
            Some(index) => Ok(self.records.remove(index)),
            None => Err(IntakeError::NotFound(format!("Patient {} not in queue", id))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatientRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// 队列统计
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_patients: self.records.len(),
            ..Default::default()
        };

        for record in &self.records {
            *stats.patients_by_stage.entry(record.stage).or_insert(0) += 1;
            if record.questionnaire_pending() {
                stats.questionnaire_pending += 1;
            }
            if record.profile.is_new_patient {
                stats.new_patients += 1;
            }
        }

        stats
    }
}

/// 队列统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_patients: usize,
    pub new_patients: usize,
    pub questionnaire_pending: usize,
    pub patients_by_stage: HashMap<IntakeStage, usize>,
}

/// 一名患者的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeOutcome {
    pub patient_id: Uuid,
    pub reception_number: u32,
    pub evaluation: Evaluation,
    /// 完成时在活动队列中的位置
    pub queue_position: usize,
    pub skip_penalty: u32,
    /// 扣除跳号分后的最终得分
    pub score_delta: i32,
}

impl IntakeOutcome {
    pub fn rank(&self) -> Rank {
        self.evaluation.rank
    }
}

/// 历史记录条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub display_name: String,
    pub outcome: IntakeOutcome,
    pub completed_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(display_name: impl Into<String>, outcome: IntakeOutcome) -> Self {
        Self {
            display_name: display_name.into(),
            outcome,
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{profile, record};

    #[test]
    fn test_queue_keeps_insertion_order() {
        let mut queue = ActiveQueue::new();
        let first = record(profile(), 12);
        let second = record(profile(), 3);
        let (first_id, second_id) = (first.id(), second.id());

        queue.push(first);
        queue.push(second);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.position(first_id), Some(0));
        assert_eq!(queue.position(second_id), Some(1));

        let removed = queue.remove(first_id).unwrap();
        assert_eq!(removed.reception_number(), 12);
        assert_eq!(queue.position(second_id), Some(0));
        assert!(matches!(queue.remove(first_id), Err(IntakeError::NotFound(_))));
    }

    #[test]
    fn test_queue_stats() {
        let mut queue = ActiveQueue::new();
        let mut p = profile();
        p.is_new_patient = true;
        p.needs_questionnaire = true;
        queue.push(record(p, 1));

        let mut advanced = record(profile(), 2);
        advanced.stage = IntakeStage::Insurance;
        queue.push(advanced);

        let stats = queue.stats();
        assert_eq!(stats.total_patients, 2);
        assert_eq!(stats.new_patients, 1);
        assert_eq!(stats.questionnaire_pending, 1);
        assert_eq!(stats.patients_by_stage.get(&IntakeStage::Triage), Some(&1));
        assert_eq!(stats.patients_by_stage.get(&IntakeStage::Insurance), Some(&1));
    }
}
