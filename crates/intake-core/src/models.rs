//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::utils::non_blank;

/// 后期高龄者保险区分的标签
pub const LATE_ELDER_LABEL: &str = "後期高齢者";

/// 分诊源数据（外部提供，只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageSourceRecord {
    pub chief_complaint: String,              // 主诉
    #[serde(default)]
    pub urine_test: String,                   // 尿检标记 ("TRUE"/"FALSE")
    #[serde(default)]
    pub medical_history: String,              // 既往史
    #[serde(default)]
    pub prescription: String,                // 处方说明
    #[serde(default)]
    pub costs: TreatmentCosts,
    #[serde(default)]
    pub judgment_reason: String,              // 判断理由
}

impl TriageSourceRecord {
    /// 尿检标记为 "TRUE"（不区分大小写）时需要检查
    pub fn test_needed(&self) -> bool {
        self.urine_test.trim().eq_ignore_ascii_case("TRUE")
    }
}

/// 各类诊疗费用
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentCosts {
    pub injection: u32,   // 注射
    pub procedure: u32,   // 处置
    pub anesthesia: u32,  // 麻醉
    pub examination: u32, // 检查
    pub imaging: u32,     // 影像
    pub self_pay: u32,    // 自费
}

impl TreatmentCosts {
    pub fn total(&self) -> u32 {
        self.injection + self.procedure + self.anesthesia + self.examination + self.imaging + self.self_pay
    }
}

/// 保险源数据（外部提供，只读）
///
/// 纸质保险证以记号/番号/枝番为键，电子保险证以个人ID为键。
/// 形态不单独存储，由记号与番号是否同时存在推导。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceSourceRecord {
    pub name: String,
    pub furigana: String,
    pub birth_date: Option<String>,
    pub age: Option<String>,
    pub gender: Option<Gender>,
    pub category: String,
    pub burden_ratio: Option<String>,
    pub insurer_number: Option<String>,
    pub symbol: Option<String>,
    pub number: Option<String>,
    pub branch_number: Option<String>,
    pub personal_id: Option<String>,
    pub patient_id: Option<String>, // 复诊患者的诊察券号
}

impl InsuranceSourceRecord {
    /// 记号与番号都存在时为纸质保险证，否则为电子保险证
    pub fn insurance_type(&self) -> InsuranceType {
        if non_blank(self.symbol.as_deref()).is_some() && non_blank(self.number.as_deref()).is_some() {
            InsuranceType::Paper
        } else {
            InsuranceType::Electronic
        }
    }
}

/// 性别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "男")]
    Male,
    #[serde(alias = "女")]
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "男",
            Gender::Female => "女",
        }
    }
}

/// 保险证类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsuranceType {
    Paper,      // 纸质
    Electronic, // 电子（My Number 卡）
}

impl fmt::Display for InsuranceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsuranceType::Paper => write!(f, "paper"),
            InsuranceType::Electronic => write!(f, "electronic"),
        }
    }
}

/// 保险区分
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InsuranceCategory {
    National,      // 国保
    Social,        // 社保
    LateElder,     // 後期高齢者
    Other(String),
}

impl InsuranceCategory {
    pub fn label(&self) -> &str {
        match self {
            InsuranceCategory::National => "国保",
            InsuranceCategory::Social => "社保",
            InsuranceCategory::LateElder => LATE_ELDER_LABEL,
            InsuranceCategory::Other(label) => label,
        }
    }
}

impl From<String> for InsuranceCategory {
    fn from(label: String) -> Self {
        match label.trim() {
            "国保" => InsuranceCategory::National,
            "社保" => InsuranceCategory::Social,
            LATE_ELDER_LABEL => InsuranceCategory::LateElder,
            other => InsuranceCategory::Other(other.to_string()),
        }
    }
}

impl From<&str> for InsuranceCategory {
    fn from(label: &str) -> Self {
        InsuranceCategory::from(label.to_string())
    }
}

impl From<InsuranceCategory> for String {
    fn from(category: InsuranceCategory) -> Self {
        category.label().to_string()
    }
}

impl fmt::Display for InsuranceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 分诊附带信息，仅供展示
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageDetails {
    pub medical_history: String,
    pub prescription: String,
    pub costs: TreatmentCosts,
    pub judgment_reason: String,
}

/// 保险证上的字段（缺失值已替换为占位符）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceCard {
    pub symbol: String,
    pub number: String,
    pub branch_number: String,
    pub burden_ratio: String,
    pub insurer_number: String,
    pub personal_id: Option<String>,
}

/// 患者档案：合成器生成的身份与派生标记
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub display_name: String,
    pub furigana: String,
    pub gender: Gender,
    pub age: u32,
    pub age_label: String,
    pub birth_date: String,
    pub patient_id: Option<String>, // 新患者为 None
    pub is_new_patient: bool,
    pub needs_questionnaire: bool,
    pub needs_medical_record: bool,
    pub test_needed: bool,
    pub visible_complaint: String,
    pub hidden_complaint: String,
    pub triage: TriageDetails,
    pub insurance_type: InsuranceType,
    pub card: InsuranceCard,
    pub visual_category: InsuranceCategory,    // 保险证上印刷的区分
    pub insurance_category: InsuranceCategory, // 评分用的逻辑区分
}

/// 接诊阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntakeStage {
    Triage,    // 0 分诊
    WaitTime,  // 1 等待时间说明
    Insurance, // 2 保险确认
    Complete,  // 终态
}

impl IntakeStage {
    /// 活跃阶段对应的 processStep，终态返回 None
    pub fn process_step(&self) -> Option<u8> {
        match self {
            IntakeStage::Triage => Some(0),
            IntakeStage::WaitTime => Some(1),
            IntakeStage::Insurance => Some(2),
            IntakeStage::Complete => None,
        }
    }
}

/// 分诊决定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriageDecision {
    /// 交付尿杯并申报区分
    GiveCup { category: InsuranceCategory },
    NoCup,
}

impl TriageDecision {
    pub fn cup_given(&self) -> bool {
        matches!(self, TriageDecision::GiveCup { .. })
    }
}

/// 等待时间档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaitTimeBand {
    NoAnnouncement,   // [0,10)
    AboutOneHour,     // [10,20)
    AboutTwoHours,    // [20,30)
    ThreeHoursOrMore, // [30,∞)
}

impl WaitTimeBand {
    pub const ALL: [WaitTimeBand; 4] = [
        WaitTimeBand::NoAnnouncement,
        WaitTimeBand::AboutOneHour,
        WaitTimeBand::AboutTwoHours,
        WaitTimeBand::ThreeHoursOrMore,
    ];

    /// 按前方等待人数确定档位，负数归入第一档
    pub fn for_waiting(waiting: i64) -> Self {
        match waiting {
            i64::MIN..=9 => WaitTimeBand::NoAnnouncement,
            10..=19 => WaitTimeBand::AboutOneHour,
            20..=29 => WaitTimeBand::AboutTwoHours,
            _ => WaitTimeBand::ThreeHoursOrMore,
        }
    }
}

/// 等待时间说明：所选档位以及说明当时的等待人数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitTimeGuidance {
    pub chosen: WaitTimeBand,
    pub waiting: i64,
}

impl WaitTimeGuidance {
    pub fn is_correct(&self) -> bool {
        self.chosen == WaitTimeBand::for_waiting(self.waiting)
    }
}

/// 打字录入的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataEntryField {
    Name,
    Furigana,
    BirthDate,
    InsurerNumber,
    Symbol,
    Number,
    BranchNumber,
}

/// 打字小游戏提交的单个字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub field: DataEntryField,
    pub value: String,
}

impl TypedField {
    pub fn new(field: DataEntryField, value: impl Into<String>) -> Self {
        Self { field, value: value.into() }
    }
}

/// 病历盖章表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampForm {
    pub date: bool,
    pub insurance: Option<InsuranceType>,
    pub urine: bool,
}

/// 受付票
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionTicket {
    pub typed_id: Option<String>,
    pub typed_name: Option<String>,
    pub insurance: Option<InsuranceType>,
    pub urine: bool,
}

/// 台账条目来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerSource {
    Triage,
    WaitTime,
    DataEntry,
    Completion,
    Manual,
}

impl LedgerSource {
    /// 可由记录字段重新推导的来源
    pub fn is_derivable(&self) -> bool {
        !matches!(self, LedgerSource::Manual)
    }
}

/// 失误台账条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeEntry {
    pub points: u32,
    pub reason: String,
    pub is_mistake: bool,
    pub source: LedgerSource,
}

/// 评级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Perfect,
    Warning,
    Bad,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Perfect => write!(f, "perfect"),
            Rank::Warning => write!(f, "warning"),
            Rank::Bad => write!(f, "bad"),
        }
    }
}

/// 患者记录
///
/// 由合成器创建，生命周期内由工作流独占。受付番号创建后不可修改，
/// 失误台账只能追加。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub profile: PatientProfile,
    reception_number: u32,
    pub stage: IntakeStage,
    pub questionnaire_completed: bool,
    pub triage_decision: Option<TriageDecision>,
    pub wait_time: Option<WaitTimeGuidance>,
    pub electronic_confirmed: bool,
    pub data_entry: Option<Vec<TypedField>>,
    pub medical_record_retrieved: bool,
    pub stamps: StampForm,
    pub ticket: ReceptionTicket,
    mistake_log: Vec<MistakeEntry>,
    pub created_at: DateTime<Utc>,
}

impl PatientRecord {
    pub fn new(profile: PatientProfile, reception_number: u32) -> Self {
        Self {
            profile,
            reception_number,
            stage: IntakeStage::Triage,
            questionnaire_completed: false,
            triage_decision: None,
            wait_time: None,
            electronic_confirmed: false,
            data_entry: None,
            medical_record_retrieved: false,
            stamps: StampForm::default(),
            ticket: ReceptionTicket::default(),
            mistake_log: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.profile.id
    }

    pub fn reception_number(&self) -> u32 {
        self.reception_number
    }

    pub fn process_step(&self) -> Option<u8> {
        self.stage.process_step()
    }

    /// 需要问诊表且尚未完成时，分诊不可进行
    pub fn questionnaire_pending(&self) -> bool {
        self.profile.needs_questionnaire && !self.questionnaire_completed
    }

    /// 问诊表完成：把隐藏主诉写回可见字段
    pub fn complete_questionnaire(&mut self) {
        if self.profile.needs_questionnaire && !self.questionnaire_completed {
            self.profile.visible_complaint = self.profile.hidden_complaint.clone();
        }
        self.questionnaire_completed = true;
    }

    pub fn cup_given(&self) -> bool {
        self.triage_decision.as_ref().map(TriageDecision::cup_given).unwrap_or(false)
    }

    /// 追加失误
    pub fn record_mistake(&mut self, points: u32, reason: impl Into<String>, source: LedgerSource) {
        self.mistake_log.push(MistakeEntry {
            points,
            reason: reason.into(),
            is_mistake: true,
            source,
        });
    }

    /// 追加加分项（不计入失误点数）
    pub fn record_bonus(&mut self, points: u32, reason: impl Into<String>) {
        self.mistake_log.push(MistakeEntry {
            points,
            reason: reason.into(),
            is_mistake: false,
            source: LedgerSource::Manual,
        });
    }

    pub fn mistake_log(&self) -> &[MistakeEntry] {
        &self.mistake_log
    }

    /// 当前失误点数：仅累计 is_mistake 的条目
    pub fn current_mistake_points(&self) -> u32 {
        self.mistake_log
            .iter()
            .filter(|entry| entry.is_mistake)
            .map(|entry| entry.points)
            .sum()
    }
}
