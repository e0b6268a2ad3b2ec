//! 测试用的源数据与患者记录

use intake_core::{
    Gender, InsuranceCard, InsuranceCategory, InsuranceSourceRecord, InsuranceType, PatientProfile,
    PatientRecord, TreatmentCosts, TriageDetails, TriageSourceRecord,
};
use intake_data::SourceData;
use uuid::Uuid;

pub fn triage_source(complaint: &str, test_needed: bool) -> TriageSourceRecord {
    TriageSourceRecord {
        chief_complaint: complaint.to_string(),
        urine_test: if test_needed { "TRUE" } else { "FALSE" }.to_string(),
        medical_history: "なし".to_string(),
        prescription: String::new(),
        costs: TreatmentCosts {
            examination: 280,
            ..Default::default()
        },
        judgment_reason: String::new(),
    }
}

pub fn insurance_source(name: &str, category: &str) -> InsuranceSourceRecord {
    InsuranceSourceRecord {
        name: name.to_string(),
        furigana: "テスト カンジャ".to_string(),
        category: category.to_string(),
        insurer_number: Some("138057".to_string()),
        ..Default::default()
    }
}

pub fn paper_insurance_source(name: &str, category: &str) -> InsuranceSourceRecord {
    InsuranceSourceRecord {
        symbol: Some("7".to_string()),
        number: Some("1024".to_string()),
        branch_number: Some("01".to_string()),
        ..insurance_source(name, category)
    }
}

pub fn source_data(triage_count: usize) -> SourceData {
    SourceData {
        triage: (0..triage_count)
            .map(|i| triage_source(&format!("症状{}", i), i % 2 == 0))
            .collect(),
        electronic_insurance: vec![
            insurance_source("佐藤 花子", "国保"),
            insurance_source("鈴木 一郎", "社保"),
        ],
        paper_insurance: vec![paper_insurance_source("高橋 健", "社保")],
    }
}

/// 构造一个复诊、纸质保险证、社保的患者档案
pub fn profile() -> PatientProfile {
    PatientProfile {
        id: Uuid::new_v4(),
        display_name: "山田 太郎".to_string(),
        furigana: "ヤマダ タロウ".to_string(),
        gender: Gender::Male,
        age: 45,
        age_label: "45歳".to_string(),
        birth_date: "昭和55年4月1日".to_string(),
        patient_id: Some("123456".to_string()),
        is_new_patient: false,
        needs_questionnaire: false,
        needs_medical_record: false,
        test_needed: false,
        visible_complaint: "頭痛".to_string(),
        hidden_complaint: "頭痛".to_string(),
        triage: TriageDetails::default(),
        insurance_type: InsuranceType::Paper,
        card: InsuranceCard {
            symbol: "7".to_string(),
            number: "1024".to_string(),
            branch_number: "01".to_string(),
            burden_ratio: "3割".to_string(),
            insurer_number: "06130001".to_string(),
            personal_id: None,
        },
        visual_category: InsuranceCategory::Social,
        insurance_category: InsuranceCategory::Social,
    }
}

pub fn record(profile: PatientProfile, reception_number: u32) -> PatientRecord {
    PatientRecord::new(profile, reception_number)
}
