//! 校验规则表
//!
//! 每条规则由 (路线, 条件) 决定 (原因, 点数)。规则只读取记录字段，
//! 同一记录重复校验得到相同结果。

use intake_core::utils::non_blank;
use intake_core::{DataEntryField, InsuranceType, LedgerSource, MistakeEntry, PatientRecord, TriageDecision};
use serde::{Deserialize, Serialize};

use crate::names::NameMatcher;
use crate::state_machine::CompletionRoute;

pub const REASON_DATE_STAMP_MISSING: &str = "date stamp missing";
pub const REASON_INSURANCE_MISSING: &str = "insurance confirmation missing";
pub const REASON_INSURANCE_MISMATCH: &str = "insurance type mismatch";
pub const REASON_URINE_MISSING: &str = "urine mark missing";
pub const REASON_URINE_UNRECORDED: &str = "urine mark missing (given but unrecorded)";
pub const REASON_URINE_EXCESSIVE: &str = "urine mark excessive";
pub const REASON_TYPED_FIELD_MISMATCH: &str = "typed-field mismatch";
pub const REASON_NAME_MISMATCH: &str = "name mismatch";
pub const REASON_CATEGORY_MISMATCH: &str = "category mismatch";
pub const REASON_UNNECESSARY_CUP: &str = "unnecessary cup given";
pub const REASON_MISSED_NEED: &str = "missed need (severe)";
pub const REASON_WAIT_TIME_ERROR: &str = "wait-time guidance error";

/// 默认的打字录入扣分上限
pub const DEFAULT_DATA_ENTRY_CEILING: u32 = 30;

/// 校验路线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationRoute {
    Triage,
    WaitTime,
    DataEntry,
    MedicalRecord,
    ReceptionTicket,
}

impl ValidationRoute {
    /// 校验顺序与阶段顺序一致
    pub const ALL: [ValidationRoute; 5] = [
        ValidationRoute::Triage,
        ValidationRoute::WaitTime,
        ValidationRoute::DataEntry,
        ValidationRoute::MedicalRecord,
        ValidationRoute::ReceptionTicket,
    ];

    /// 路线是否适用于该记录
    pub fn applies(&self, record: &PatientRecord) -> bool {
        match self {
            ValidationRoute::Triage => record.triage_decision.is_some(),
            ValidationRoute::WaitTime => record.wait_time.is_some(),
            ValidationRoute::DataEntry => record.data_entry.is_some(),
            ValidationRoute::MedicalRecord => {
                CompletionRoute::for_profile(&record.profile) == CompletionRoute::MedicalRecord
            }
            ValidationRoute::ReceptionTicket => {
                CompletionRoute::for_profile(&record.profile) == CompletionRoute::ReceptionTicket
            }
        }
    }

    pub fn ledger_source(&self) -> LedgerSource {
        match self {
            ValidationRoute::Triage => LedgerSource::Triage,
            ValidationRoute::WaitTime => LedgerSource::WaitTime,
            ValidationRoute::DataEntry => LedgerSource::DataEntry,
            ValidationRoute::MedicalRecord | ValidationRoute::ReceptionTicket => LedgerSource::Completion,
        }
    }
}

/// 规则求值上下文
pub struct RuleContext<'a> {
    pub record: &'a PatientRecord,
    pub names: &'a dyn NameMatcher,
}

/// 校验规则
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub routes: &'static [ValidationRoute],
    pub reason: &'static str,
    pub points: u32,
    /// 返回条件成立的次数
    occurrences: fn(&RuleContext<'_>) -> u32,
}

impl ValidationRule {
    pub fn occurrences(&self, ctx: &RuleContext<'_>) -> u32 {
        (self.occurrences)(ctx)
    }
}

const COMPLETION_ROUTES: &[ValidationRoute] = &[ValidationRoute::MedicalRecord, ValidationRoute::ReceptionTicket];

fn count(condition: bool) -> u32 {
    condition as u32
}

/// 当前完成路线上的保险标记和尿检标记
fn completion_marks(record: &PatientRecord) -> (Option<InsuranceType>, bool) {
    match CompletionRoute::for_profile(&record.profile) {
        CompletionRoute::MedicalRecord => (record.stamps.insurance, record.stamps.urine),
        CompletionRoute::ReceptionTicket => (record.ticket.insurance, record.ticket.urine),
    }
}

fn typed_matches(ctx: &RuleContext<'_>, field: DataEntryField, typed: &str) -> bool {
    let profile = &ctx.record.profile;
    let expected = match field {
        DataEntryField::Name => return ctx.names.names_match(typed, &profile.display_name),
        DataEntryField::Furigana => return ctx.names.names_match(typed, &profile.furigana),
        DataEntryField::BirthDate => &profile.birth_date,
        DataEntryField::InsurerNumber => &profile.card.insurer_number,
        DataEntryField::Symbol => &profile.card.symbol,
        DataEntryField::Number => &profile.card.number,
        DataEntryField::BranchNumber => &profile.card.branch_number,
    };
    typed.trim() == expected.trim()
}

/// 打字录入需要核对的字段
pub const DATA_ENTRY_FIELDS: [DataEntryField; 7] = [
    DataEntryField::Name,
    DataEntryField::Furigana,
    DataEntryField::BirthDate,
    DataEntryField::InsurerNumber,
    DataEntryField::Symbol,
    DataEntryField::Number,
    DataEntryField::BranchNumber,
];

/// 默认规则表
pub fn default_rules() -> Vec<ValidationRule> {
    vec![
        // 分诊
        ValidationRule {
            routes: &[ValidationRoute::Triage],
            reason: REASON_CATEGORY_MISMATCH,
            points: 10,
            occurrences: |ctx| match &ctx.record.triage_decision {
                Some(TriageDecision::GiveCup { category }) => {
                    count(ctx.record.profile.test_needed && *category != ctx.record.profile.insurance_category)
                }
                _ => 0,
            },
        },
        ValidationRule {
            routes: &[ValidationRoute::Triage],
            reason: REASON_UNNECESSARY_CUP,
            points: 5,
            occurrences: |ctx| count(ctx.record.cup_given() && !ctx.record.profile.test_needed),
        },
        ValidationRule {
            routes: &[ValidationRoute::Triage],
            reason: REASON_MISSED_NEED,
            points: 20,
            occurrences: |ctx| count(!ctx.record.cup_given() && ctx.record.profile.test_needed),
        },
        // 等待时间
        ValidationRule {
            routes: &[ValidationRoute::WaitTime],
            reason: REASON_WAIT_TIME_ERROR,
            points: 10,
            occurrences: |ctx| count(ctx.record.wait_time.map(|g| !g.is_correct()).unwrap_or(false)),
        },
        // 纸质新患者的打字录入
        ValidationRule {
            routes: &[ValidationRoute::DataEntry],
            reason: REASON_TYPED_FIELD_MISMATCH,
            points: 10,
            occurrences: |ctx| {
                let entries = ctx.record.data_entry.as_deref().unwrap_or_default();
                DATA_ENTRY_FIELDS
                    .iter()
                    .filter(|&&field| {
                        match entries.iter().find(|entry| entry.field == field) {
                            Some(entry) => !typed_matches(ctx, field, &entry.value),
                            None => true,
                        }
                    })
                    .count() as u32
            },
        },
        // 病历盖章
        ValidationRule {
            routes: &[ValidationRoute::MedicalRecord],
            reason: REASON_DATE_STAMP_MISSING,
            points: 10,
            occurrences: |ctx| count(!ctx.record.stamps.date),
        },
        // 两条完成路线共用
        ValidationRule {
            routes: COMPLETION_ROUTES,
            reason: REASON_INSURANCE_MISSING,
            points: 10,
            occurrences: |ctx| count(completion_marks(ctx.record).0.is_none()),
        },
        ValidationRule {
            routes: COMPLETION_ROUTES,
            reason: REASON_INSURANCE_MISMATCH,
            points: 10,
            occurrences: |ctx| {
                let expected = ctx.record.profile.insurance_type;
                count(completion_marks(ctx.record).0.map(|mark| mark != expected).unwrap_or(false))
            },
        },
        ValidationRule {
            routes: COMPLETION_ROUTES,
            reason: REASON_URINE_MISSING,
            points: 10,
            occurrences: |ctx| count(ctx.record.profile.test_needed && !completion_marks(ctx.record).1),
        },
        ValidationRule {
            routes: COMPLETION_ROUTES,
            reason: REASON_URINE_UNRECORDED,
            points: 10,
            occurrences: |ctx| {
                count(!ctx.record.profile.test_needed && ctx.record.cup_given() && !completion_marks(ctx.record).1)
            },
        },
        ValidationRule {
            routes: COMPLETION_ROUTES,
            reason: REASON_URINE_EXCESSIVE,
            points: 10,
            occurrences: |ctx| {
                count(!ctx.record.profile.test_needed && !ctx.record.cup_given() && completion_marks(ctx.record).1)
            },
        },
        // 受付票
        ValidationRule {
            routes: &[ValidationRoute::ReceptionTicket],
            reason: REASON_TYPED_FIELD_MISMATCH,
            points: 10,
            occurrences: |ctx| match non_blank(ctx.record.ticket.typed_id.as_deref()) {
                Some(typed) => {
                    let expected = non_blank(ctx.record.profile.patient_id.as_deref()).unwrap_or("");
                    count(typed != expected)
                }
                None => 0,
            },
        },
        ValidationRule {
            routes: &[ValidationRoute::ReceptionTicket],
            reason: REASON_NAME_MISMATCH,
            points: 10,
            occurrences: |ctx| match non_blank(ctx.record.ticket.typed_name.as_deref()) {
                Some(typed) => {
                    let profile = &ctx.record.profile;
                    count(
                        !ctx.names.names_match(typed, &profile.display_name)
                            && !ctx.names.names_match(typed, &profile.furigana),
                    )
                }
                None => 0,
            },
        },
    ]
}

/// 校验器
#[derive(Debug, Clone)]
pub struct Validator {
    rules: Vec<ValidationRule>,
    data_entry_ceiling: u32,
}

impl Validator {
    pub fn new(data_entry_ceiling: u32) -> Self {
        Self {
            rules: default_rules(),
            data_entry_ceiling,
        }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn data_entry_ceiling(&self) -> u32 {
        self.data_entry_ceiling
    }

    /// 校验单条路线，路线不适用时返回空
    pub fn validate_route(
        &self,
        route: ValidationRoute,
        record: &PatientRecord,
        names: &dyn NameMatcher,
    ) -> Vec<MistakeEntry> {
        if !route.applies(record) {
            return Vec::new();
        }

        let ctx = RuleContext { record, names };
        let mut findings = Vec::new();

        for rule in self.rules.iter().filter(|rule| rule.routes.contains(&route)) {
            for _ in 0..rule.occurrences(&ctx) {
                findings.push(MistakeEntry {
                    points: rule.points,
                    reason: rule.reason.to_string(),
                    is_mistake: true,
                    source: route.ledger_source(),
                });
            }
        }

        if route == ValidationRoute::DataEntry {
            apply_ceiling(&mut findings, self.data_entry_ceiling);
        }

        findings
    }

    /// 按阶段顺序校验全部适用路线
    pub fn validate_all(&self, record: &PatientRecord, names: &dyn NameMatcher) -> Vec<MistakeEntry> {
        ValidationRoute::ALL
            .iter()
            .flat_map(|&route| self.validate_route(route, record, names))
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ENTRY_CEILING)
    }
}

/// 总扣分不超过上限，超出部分截断
fn apply_ceiling(findings: &mut Vec<MistakeEntry>, ceiling: u32) {
    let mut used = 0;
    findings.retain_mut(|entry| {
        let points = entry.points.min(ceiling - used);
        used += points;
        entry.points = points;
        points > 0
    });
}
