//! 接诊状态机
//!
//! 管理患者从分诊到完成的阶段转换，以及保险确认阶段的分支

use intake_core::{IntakeError, IntakeStage, InsuranceType, PatientProfile, PatientRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 阶段转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IntakeEvent {
    TriageDecided,
    WaitTimeAnnounced,
    Finalized,
}

/// 接诊状态机
#[derive(Debug)]
pub struct IntakeStateMachine {
    transitions: HashMap<(IntakeStage, IntakeEvent), IntakeStage>,
}

impl IntakeStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((IntakeStage::Triage, IntakeEvent::TriageDecided), IntakeStage::WaitTime);
        transitions.insert((IntakeStage::WaitTime, IntakeEvent::WaitTimeAnnounced), IntakeStage::Insurance);
        transitions.insert((IntakeStage::Insurance, IntakeEvent::Finalized), IntakeStage::Complete);

        Self { transitions }
    }

    /// 检查阶段转换是否有效
    pub fn can_transition(&self, from: IntakeStage, event: IntakeEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行阶段转换
    pub fn transition(&self, from: IntakeStage, event: IntakeEvent) -> Result<IntakeStage> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(IntakeError::InvalidStageTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取所有阶段
    pub fn get_all_stages() -> Vec<IntakeStage> {
        vec![
            IntakeStage::Triage,
            IntakeStage::WaitTime,
            IntakeStage::Insurance,
            IntakeStage::Complete,
        ]
    }

    /// 获取阶段的所有可能事件
    pub fn get_possible_events(&self, current: IntakeStage) -> Vec<IntakeEvent> {
        self.transitions
            .keys()
            .filter(|(stage, _)| *stage == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for IntakeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 保险确认阶段的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsuranceBranch {
    /// 电子保险证：只需确认
    ElectronicConfirm,
    /// 纸质保险证新患者：需要打字录入
    PaperDataEntry,
    /// 纸质保险证复诊患者：直接可以完成
    PaperReturning,
}

impl InsuranceBranch {
    pub fn for_profile(profile: &PatientProfile) -> Self {
        match (profile.insurance_type, profile.is_new_patient) {
            (InsuranceType::Electronic, _) => InsuranceBranch::ElectronicConfirm,
            (InsuranceType::Paper, true) => InsuranceBranch::PaperDataEntry,
            (InsuranceType::Paper, false) => InsuranceBranch::PaperReturning,
        }
    }
}

/// 完成路线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionRoute {
    /// 调取病历后盖章
    MedicalRecord,
    /// 填写受付票
    ReceptionTicket,
}

impl CompletionRoute {
    pub fn for_profile(profile: &PatientProfile) -> Self {
        if profile.needs_medical_record {
            CompletionRoute::MedicalRecord
        } else {
            CompletionRoute::ReceptionTicket
        }
    }
}

/// 是否已满足完成条件
pub fn completion_eligible(record: &PatientRecord) -> bool {
    if record.stage != IntakeStage::Insurance {
        return false;
    }
    match InsuranceBranch::for_profile(&record.profile) {
        InsuranceBranch::ElectronicConfirm => record.electronic_confirmed,
        InsuranceBranch::PaperDataEntry => record.data_entry.is_some(),
        InsuranceBranch::PaperReturning => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{profile, record};

    #[test]
    fn test_valid_transitions() {
        let sm = IntakeStateMachine::new();

        assert!(sm.can_transition(IntakeStage::Triage, IntakeEvent::TriageDecided));
        assert!(sm.can_transition(IntakeStage::WaitTime, IntakeEvent::WaitTimeAnnounced));
        assert!(sm.can_transition(IntakeStage::Insurance, IntakeEvent::Finalized));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = IntakeStateMachine::new();

        assert!(!sm.can_transition(IntakeStage::Triage, IntakeEvent::Finalized));
        assert!(!sm.can_transition(IntakeStage::Insurance, IntakeEvent::TriageDecided));
        assert!(sm.get_possible_events(IntakeStage::Complete).is_empty());
    }

    #[test]
    fn test_state_execution() {
        let sm = IntakeStateMachine::new();

        let result = sm.transition(IntakeStage::Triage, IntakeEvent::TriageDecided);
        assert_eq!(result.unwrap(), IntakeStage::WaitTime);

        let result = sm.transition(IntakeStage::Complete, IntakeEvent::Finalized);
        assert!(matches!(result, Err(IntakeError::InvalidStageTransition { .. })));
    }

    #[test]
    fn test_insurance_branches() {
        let mut p = profile();
        assert_eq!(InsuranceBranch::for_profile(&p), InsuranceBranch::PaperReturning);

        p.is_new_patient = true;
        assert_eq!(InsuranceBranch::for_profile(&p), InsuranceBranch::PaperDataEntry);

        p.insurance_type = InsuranceType::Electronic;
        assert_eq!(InsuranceBranch::for_profile(&p), InsuranceBranch::ElectronicConfirm);

        p.is_new_patient = false;
        assert_eq!(InsuranceBranch::for_profile(&p), InsuranceBranch::ElectronicConfirm);
    }

    #[test]
    fn test_completion_eligibility() {
        let mut r = record(profile(), 4);
        assert!(!completion_eligible(&r));

        r.stage = IntakeStage::Insurance;
        assert!(completion_eligible(&r));

        r.profile.insurance_type = InsuranceType::Electronic;
        assert!(!completion_eligible(&r));
        r.electronic_confirmed = true;
        assert!(completion_eligible(&r));

        r.profile.insurance_type = InsuranceType::Paper;
        r.profile.is_new_patient = true;
        assert!(!completion_eligible(&r));
        r.data_entry = Some(Vec::new());
        assert!(completion_eligible(&r));
    }
}
