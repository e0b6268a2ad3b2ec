//! 脚本化操作员
//!
//! 以给定准确率模拟前台操作，每个判断独立抽取是否答对

use anyhow::{Context, Result};
use intake_core::{
    DataEntryField, InsuranceCategory, InsuranceType, PatientRecord, ReceptionTicket, StampForm, TriageDecision,
    TypedField, WaitTimeBand,
};
use intake_workflow::{CompletionRoute, InsuranceBranch, IntakeOutcome, IntakeSession};
use rand::rngs::StdRng;
use rand::Rng;
use uuid::Uuid;

/// 脚本化操作员
#[derive(Debug)]
pub struct ScriptedOperator {
    accuracy: f64,
    rng: StdRng,
}

impl ScriptedOperator {
    /// 非有限的准确率按 0 处理
    pub fn new(accuracy: f64, rng: StdRng) -> Self {
        let accuracy = if accuracy.is_finite() {
            accuracy.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { accuracy, rng }
    }

    fn correct(&mut self) -> bool {
        self.rng.gen_bool(self.accuracy)
    }

    /// 处理队首患者直到完成
    pub fn process_next(&mut self, session: &mut IntakeSession) -> Result<Option<IntakeOutcome>> {
        let id = match session.queue().iter().next() {
            Some(record) => record.id(),
            None => return Ok(None),
        };
        self.process(session, id).map(Some)
    }

    /// 按阶段顺序处理一名患者并完成接诊
    pub fn process(&mut self, session: &mut IntakeSession, id: Uuid) -> Result<IntakeOutcome> {
        let record = session
            .patient(id)
            .cloned()
            .with_context(|| format!("Patient {} not in queue", id))?;

        if record.questionnaire_pending() {
            session.complete_questionnaire(id)?;
        }

        let decision = self.triage_decision(&record);
        session.decide_triage(id, decision)?;

        let waiting = i64::from(record.reception_number()) - i64::from(session.last_finished_number());
        let band = self.wait_time_band(WaitTimeBand::for_waiting(waiting));
        session.announce_wait_time(id, band)?;

        match InsuranceBranch::for_profile(&record.profile) {
            InsuranceBranch::ElectronicConfirm => session.confirm_electronic_insurance(id)?,
            InsuranceBranch::PaperDataEntry => {
                let fields = self.data_entry(&record);
                session.submit_data_entry(id, fields)?;
            }
            InsuranceBranch::PaperReturning => {}
        }

        let profile = &record.profile;
        let insurance = self.insurance_mark(profile.insurance_type);
        let urine = if self.correct() { profile.test_needed } else { !profile.test_needed };

        match CompletionRoute::for_profile(profile) {
            CompletionRoute::MedicalRecord => {
                let card_id = profile.patient_id.clone().unwrap_or_default();
                if !session.retrieve_medical_record(id, &card_id)? {
                    anyhow::bail!("Medical record {} not found for patient {}", card_id, id);
                }
                let date = self.correct();
                session.apply_stamps(id, StampForm { date, insurance, urine })?;
            }
            CompletionRoute::ReceptionTicket => {
                let typed_id = if self.correct() {
                    profile.patient_id.clone()
                } else {
                    Some(format!("{:06}", self.rng.gen_range(0..1_000_000)))
                };
                let typed_name = if self.correct() {
                    profile.display_name.clone()
                } else {
                    format!("{}?", profile.display_name)
                };
                session.fill_reception_ticket(
                    id,
                    ReceptionTicket {
                        typed_id,
                        typed_name: Some(typed_name),
                        insurance,
                        urine,
                    },
                )?;
            }
        }

        Ok(session.finalize(id)?)
    }

    fn triage_decision(&mut self, record: &PatientRecord) -> TriageDecision {
        let profile = &record.profile;
        let correct = self.correct();
        match (profile.test_needed, correct) {
            (true, true) => TriageDecision::GiveCup {
                category: profile.insurance_category.clone(),
            },
            (false, true) => TriageDecision::NoCup,
            (true, false) => {
                // 两种错法：不给尿杯，或者申报成印刷的区分
                if self.rng.gen_bool(0.5) {
                    TriageDecision::NoCup
                } else {
                    let mut wrong: Vec<InsuranceCategory> = [
                        InsuranceCategory::National,
                        InsuranceCategory::Social,
                        InsuranceCategory::LateElder,
                    ]
                    .into_iter()
                    .filter(|category| *category != profile.insurance_category)
                    .collect();
                    let index = self.rng.gen_range(0..wrong.len());
                    TriageDecision::GiveCup {
                        category: wrong.swap_remove(index),
                    }
                }
            }
            (false, false) => TriageDecision::GiveCup {
                category: profile.insurance_category.clone(),
            },
        }
    }

    fn wait_time_band(&mut self, correct_band: WaitTimeBand) -> WaitTimeBand {
        if self.correct() {
            return correct_band;
        }
        let wrong: Vec<WaitTimeBand> = WaitTimeBand::ALL
            .iter()
            .copied()
            .filter(|band| *band != correct_band)
            .collect();
        wrong[self.rng.gen_range(0..wrong.len())]
    }

    fn insurance_mark(&mut self, expected: InsuranceType) -> Option<InsuranceType> {
        if self.correct() {
            return Some(expected);
        }
        match expected {
            InsuranceType::Paper => Some(InsuranceType::Electronic),
            InsuranceType::Electronic => Some(InsuranceType::Paper),
        }
    }

    fn data_entry(&mut self, record: &PatientRecord) -> Vec<TypedField> {
        let profile = &record.profile;
        let truth = [
            (DataEntryField::Name, &profile.display_name),
            (DataEntryField::Furigana, &profile.furigana),
            (DataEntryField::BirthDate, &profile.birth_date),
            (DataEntryField::InsurerNumber, &profile.card.insurer_number),
            (DataEntryField::Symbol, &profile.card.symbol),
            (DataEntryField::Number, &profile.card.number),
            (DataEntryField::BranchNumber, &profile.card.branch_number),
        ];

        truth
            .into_iter()
            .map(|(field, value)| {
                if self.correct() {
                    TypedField::new(field, value.as_str())
                } else {
                    TypedField::new(field, format!("{}?", value))
                }
            })
            .collect()
    }
}
