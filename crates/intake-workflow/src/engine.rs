//! 接诊会话引擎
//!
//! 协调生成器、状态机、校验和评分的核心引擎。一次会话对应一个班次，
//! 所有患者记录只通过会话的 `&mut self` 方法修改。

use intake_core::{
    IntakeError, IntakeStage, MistakeEntry, LedgerSource, PatientRecord, ReceptionTicket, Result,
    StampForm, TriageDecision, TypedField, WaitTimeBand, WaitTimeGuidance,
};
use intake_data::SourceData;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{
    allocator::{AllocatorSettings, ReceptionNumberAllocator},
    generator::PatientGenerator,
    names::{NameMatcher, NormalizedNameMatcher},
    queue::{ActiveQueue, HistoryEntry, IntakeOutcome, QueueStats},
    scoring::{Evaluation, ScoringEngine, ScoringPolicy},
    state_machine::{completion_eligible, CompletionRoute, InsuranceBranch, IntakeEvent, IntakeStateMachine},
    synthesizer::{PatientSynthesizer, SynthesisPolicy},
    validation::ValidationRoute,
};

/// 会话设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeSettings {
    pub allocator: AllocatorSettings,
    pub synthesis: SynthesisPolicy,
    pub scoring: ScoringPolicy,
    /// 固定种子时生成结果可复现
    pub seed: Option<u64>,
}

/// 接诊会话
pub struct IntakeSession {
    data: SourceData,
    allocator: ReceptionNumberAllocator,
    generator: PatientGenerator,
    state_machine: IntakeStateMachine,
    scoring: ScoringEngine,
    names: Box<dyn NameMatcher>,
    queue: ActiveQueue,
    history: Vec<HistoryEntry>,
    last_finished_number: u32,
    score: i64,
    rng: StdRng,
}

impl IntakeSession {
    /// 创建新的接诊会话
    pub fn new(data: SourceData, settings: IntakeSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            data,
            allocator: ReceptionNumberAllocator::new(settings.allocator),
            generator: PatientGenerator::new(PatientSynthesizer::new(settings.synthesis)),
            state_machine: IntakeStateMachine::new(),
            scoring: ScoringEngine::new(settings.scoring),
            names: Box::new(NormalizedNameMatcher),
            queue: ActiveQueue::new(),
            history: Vec::new(),
            last_finished_number: 0,
            score: 0,
            rng,
        }
    }

    /// 替换姓名匹配实现
    pub fn with_name_matcher(mut self, names: impl NameMatcher + 'static) -> Self {
        self.names = Box::new(names);
        self
    }

    /// 开始新的班次：重置分配器、队列、历史和得分后批量生成
    pub fn generate_batch(&mut self, count: usize) -> Vec<PatientRecord> {
        self.queue.clear();
        self.history.clear();
        self.last_finished_number = 0;
        self.score = 0;

        let batch = self
            .generator
            .generate_batch(&self.data, count, &mut self.allocator, &mut self.rng);
        for record in &batch {
            self.queue.push(record.clone());
        }

        tracing::info!("Session reset with {} patients", batch.len());
        batch
    }

    /// 追加一名患者到队尾
    pub fn generate_one(&mut self) -> Option<PatientRecord> {
        let record = self
            .generator
            .generate_one(&self.data, &mut self.allocator, &mut self.rng)?;
        self.queue.push(record.clone());
        tracing::info!("Patient #{} added to the queue", record.reception_number());
        Some(record)
    }

    /// 问诊表完成
    pub fn complete_questionnaire(&mut self, id: Uuid) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        record.complete_questionnaire();
        tracing::info!("Questionnaire completed for patient #{}", record.reception_number());
        Ok(())
    }

    /// 分诊：决定是否交付尿杯
    ///
    /// 无论对错都进入等待时间阶段，返回本阶段的失误。
    pub fn decide_triage(&mut self, id: Uuid, decision: TriageDecision) -> Result<Vec<MistakeEntry>> {
        let record = self.queue.get_mut(id)?;
        if record.questionnaire_pending() {
            tracing::warn!("Triage rejected for patient #{}: questionnaire pending", record.reception_number());
            return Err(IntakeError::QuestionnairePending(record.reception_number()));
        }
        let next = self.state_machine.transition(record.stage, IntakeEvent::TriageDecided)?;

        record.triage_decision = Some(decision);
        let findings = self
            .scoring
            .validator()
            .validate_route(ValidationRoute::Triage, record, self.names.as_ref());
        append_findings(record, &findings);
        record.stage = next;

        tracing::info!(
            "Patient #{} triaged ({} finding(s)), stage now {:?}",
            record.reception_number(),
            findings.len(),
            next
        );
        Ok(findings)
    }

    /// 等待时间说明
    pub fn announce_wait_time(&mut self, id: Uuid, chosen: WaitTimeBand) -> Result<Vec<MistakeEntry>> {
        let last_finished = self.last_finished_number;
        let record = self.queue.get_mut(id)?;
        let next = self.state_machine.transition(record.stage, IntakeEvent::WaitTimeAnnounced)?;

        let waiting = i64::from(record.reception_number()) - i64::from(last_finished);
        record.wait_time = Some(WaitTimeGuidance { chosen, waiting });
        let findings = self
            .scoring
            .validator()
            .validate_route(ValidationRoute::WaitTime, record, self.names.as_ref());
        append_findings(record, &findings);
        record.stage = next;

        tracing::info!(
            "Patient #{} wait time announced as {:?} (waiting {}), stage now {:?}",
            record.reception_number(),
            chosen,
            waiting,
            next
        );
        Ok(findings)
    }

    /// 电子保险证确认
    pub fn confirm_electronic_insurance(&mut self, id: Uuid) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        require_branch(record, InsuranceBranch::ElectronicConfirm)?;

        record.electronic_confirmed = true;
        tracing::info!("Electronic insurance confirmed for patient #{}", record.reception_number());
        Ok(())
    }

    /// 纸质保险证新患者的打字录入
    pub fn submit_data_entry(&mut self, id: Uuid, fields: Vec<TypedField>) -> Result<Vec<MistakeEntry>> {
        let record = self.queue.get_mut(id)?;
        require_branch(record, InsuranceBranch::PaperDataEntry)?;
        if record.data_entry.is_some() {
            return Err(IntakeError::InvalidAction(format!(
                "Data entry already submitted for patient #{}",
                record.reception_number()
            )));
        }

        record.data_entry = Some(fields);
        let findings = self
            .scoring
            .validator()
            .validate_route(ValidationRoute::DataEntry, record, self.names.as_ref());
        append_findings(record, &findings);

        tracing::info!(
            "Data entry submitted for patient #{} ({} finding(s))",
            record.reception_number(),
            findings.len()
        );
        Ok(findings)
    }

    /// 调取病历，卡号不一致时返回 false
    pub fn retrieve_medical_record(&mut self, id: Uuid, card_id: &str) -> Result<bool> {
        let record = self.queue.get_mut(id)?;
        require_route(record, CompletionRoute::MedicalRecord)?;

        let expected = record.profile.patient_id.as_deref().unwrap_or("").trim();
        let matched = !card_id.trim().is_empty() && card_id.trim() == expected;
        if matched {
            record.medical_record_retrieved = true;
            tracing::info!("Medical record retrieved for patient #{}", record.reception_number());
        } else {
            tracing::debug!(
                "Medical record {} does not belong to patient #{}",
                card_id,
                record.reception_number()
            );
        }
        Ok(matched)
    }

    /// 病历盖章
    pub fn apply_stamps(&mut self, id: Uuid, stamps: StampForm) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        require_route(record, CompletionRoute::MedicalRecord)?;
        if !record.medical_record_retrieved {
            return Err(IntakeError::InvalidAction(format!(
                "Medical record for patient #{} has not been retrieved",
                record.reception_number()
            )));
        }

        record.stamps = stamps;
        tracing::info!("Stamps applied for patient #{}", record.reception_number());
        Ok(())
    }

    /// 填写受付票
    pub fn fill_reception_ticket(&mut self, id: Uuid, ticket: ReceptionTicket) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        require_route(record, CompletionRoute::ReceptionTicket)?;

        record.ticket = ticket;
        tracing::info!("Reception ticket filled for patient #{}", record.reception_number());
        Ok(())
    }

    /// 关闭面板：不转换阶段，不记录失误
    pub fn abandon_stage(&mut self, id: Uuid) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        tracing::debug!(
            "Operator left patient #{} at stage {:?}",
            record.reception_number(),
            record.stage
        );
        Ok(())
    }

    /// 手动记录失误
    pub fn record_mistake(&mut self, id: Uuid, points: u32, reason: &str) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        record.record_mistake(points, reason, LedgerSource::Manual);
        tracing::info!("Mistake recorded for patient #{}: {} ({})", record.reception_number(), reason, points);
        Ok(())
    }

    /// 手动记录加分
    pub fn record_bonus(&mut self, id: Uuid, points: u32, reason: &str) -> Result<()> {
        let record = self.queue.get_mut(id)?;
        record.record_bonus(points, reason);
        tracing::info!("Bonus recorded for patient #{}: {} ({})", record.reception_number(), reason, points);
        Ok(())
    }

    /// 预览评分，不改变任何状态
    pub fn evaluate(&self, id: Uuid) -> Result<Evaluation> {
        let record = self
            .queue
            .get(id)
            .ok_or_else(|| IntakeError::NotFound(format!("Patient {} not in queue", id)))?;
        Ok(self.scoring.evaluate(record, self.names.as_ref()))
    }

    pub fn compute_skip_penalty(&self, queue_position: usize) -> u32 {
        self.scoring.compute_skip_penalty(queue_position)
    }

    /// 完成接诊
    ///
    /// 重新校验全部阶段，移出活动队列并计入得分和历史。
    pub fn finalize(&mut self, id: Uuid) -> Result<IntakeOutcome> {
        let (queue_position, record) = match self.queue.position(id).zip(self.queue.get(id)) {
            Some(found) => found,
            None => return Err(IntakeError::NotFound(format!("Patient {} not in queue", id))),
        };

        let next = self.state_machine.transition(record.stage, IntakeEvent::Finalized)?;
        if !completion_eligible(record) {
            return Err(IntakeError::InvalidAction(format!(
                "Patient #{} is not ready to finalize",
                record.reception_number()
            )));
        }

        let evaluation = self.scoring.evaluate(record, self.names.as_ref());
        let adjustment = self.scoring.apply_skip_penalty(evaluation.score_delta, queue_position);

        let mut record = self.queue.remove(id)?;
        record.stage = next;

        let outcome = IntakeOutcome {
            patient_id: id,
            reception_number: record.reception_number(),
            evaluation,
            queue_position,
            skip_penalty: adjustment.skip_penalty,
            score_delta: adjustment.score_delta,
        };

        self.last_finished_number = record.reception_number();
        self.score += i64::from(outcome.score_delta);
        self.history
            .push(HistoryEntry::new(record.profile.display_name.clone(), outcome.clone()));

        tracing::info!(
            "Patient #{} finalized: {} ({} points, delta {}, skip penalty {})",
            outcome.reception_number,
            outcome.evaluation.rank,
            outcome.evaluation.total_mistake_points,
            outcome.score_delta,
            outcome.skip_penalty
        );
        Ok(outcome)
    }

    /// 获取患者记录
    pub fn patient(&self, id: Uuid) -> Option<&PatientRecord> {
        self.queue.get(id)
    }

    pub fn queue(&self) -> &ActiveQueue {
        &self.queue
    }

    /// 获取队列统计
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn last_finished_number(&self) -> u32 {
        self.last_finished_number
    }

    /// 本次会话已发出的受付番号
    pub fn issued_numbers(&self) -> Vec<u32> {
        self.allocator.issued()
    }

    pub fn source_data(&self) -> &SourceData {
        &self.data
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn state_machine(&self) -> &IntakeStateMachine {
        &self.state_machine
    }
}

impl fmt::Debug for IntakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeSession")
            .field("queue", &self.queue.len())
            .field("history", &self.history.len())
            .field("last_finished_number", &self.last_finished_number)
            .field("score", &self.score)
            .field("issued", &self.allocator.issued())
            .finish()
    }
}

fn append_findings(record: &mut PatientRecord, findings: &[MistakeEntry]) {
    for finding in findings {
        record.record_mistake(finding.points, finding.reason.clone(), finding.source);
    }
}

fn require_insurance_stage(record: &PatientRecord) -> Result<()> {
    if record.stage == IntakeStage::Insurance {
        Ok(())
    } else {
        Err(IntakeError::InvalidAction(format!(
            "Patient #{} is at stage {:?}, not Insurance",
            record.reception_number(),
            record.stage
        )))
    }
}

fn require_branch(record: &PatientRecord, branch: InsuranceBranch) -> Result<()> {
    require_insurance_stage(record)?;
    let actual = InsuranceBranch::for_profile(&record.profile);
    if actual != branch {
        return Err(IntakeError::InvalidAction(format!(
            "Patient #{} uses {:?}, not {:?}",
            record.reception_number(),
            actual,
            branch
        )));
    }
    Ok(())
}

/// 完成路线的操作要求保险确认已经结束
fn require_route(record: &PatientRecord, route: CompletionRoute) -> Result<()> {
    require_insurance_stage(record)?;
    let actual = CompletionRoute::for_profile(&record.profile);
    if actual != route {
        return Err(IntakeError::InvalidAction(format!(
            "Patient #{} uses {:?}, not {:?}",
            record.reception_number(),
            actual,
            route
        )));
    }
    if !completion_eligible(record) {
        return Err(IntakeError::InvalidAction(format!(
            "Insurance not yet confirmed for patient #{}",
            record.reception_number()
        )));
    }
    Ok(())
}
