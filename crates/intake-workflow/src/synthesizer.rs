//! 患者记录合成器
//!
//! 把一条分诊源数据和一条保险源数据组合成独立的患者记录

use intake_core::utils::{
    age_label, non_blank, or_placeholder, parse_leading_age, PLACEHOLDER_BRANCH_NUMBER,
    PLACEHOLDER_BURDEN_RATIO, PLACEHOLDER_INSURER_NUMBER, PLACEHOLDER_NUMBER, PLACEHOLDER_SYMBOL,
};
use intake_core::{
    Gender, InsuranceCard, InsuranceCategory, InsuranceSourceRecord, PatientProfile, PatientRecord,
    TriageDetails, TriageSourceRecord,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::allocator::ReceptionNumberAllocator;

/// 合成策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPolicy {
    pub new_patient_probability: f64,
    pub questionnaire_probability: f64,
    pub medical_record_probability: f64,
    pub min_age: u32,
    pub max_age: u32,
    /// 达到该年龄时逻辑区分强制为後期高齢者
    pub late_elder_age: u32,
    /// 推算出生年份的基准年，固定以保证同一种子得到相同记录
    pub reference_year: i32,
}

/// 默认的出生年份推算基准年
pub const DEFAULT_REFERENCE_YEAR: i32 = 2024;

impl SynthesisPolicy {
    /// 概率收敛到 [0, 1]，非有限值按 0 处理；年龄区间颠倒时交换
    pub fn sanitized(mut self) -> Self {
        for probability in [
            &mut self.new_patient_probability,
            &mut self.questionnaire_probability,
            &mut self.medical_record_probability,
        ] {
            *probability = if probability.is_finite() {
                probability.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        if self.min_age > self.max_age {
            std::mem::swap(&mut self.min_age, &mut self.max_age);
        }
        self
    }
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self {
            new_patient_probability: 0.4,
            questionnaire_probability: 0.7,
            medical_record_probability: 0.5,
            min_age: 20,
            max_age: 85,
            late_elder_age: 70,
            reference_year: DEFAULT_REFERENCE_YEAR,
        }
    }
}

/// 患者记录合成器
#[derive(Debug, Clone, Default)]
pub struct PatientSynthesizer {
    policy: SynthesisPolicy,
}

impl PatientSynthesizer {
    pub fn new(policy: SynthesisPolicy) -> Self {
        let sanitized = policy.clone().sanitized();
        if sanitized != policy {
            tracing::warn!("Synthesis policy out of range, using {:?}", sanitized);
        }
        Self { policy: sanitized }
    }

    pub fn policy(&self) -> &SynthesisPolicy {
        &self.policy
    }

    /// 合成患者记录，受付番号分配失败时返回 None
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        triage: &TriageSourceRecord,
        insurance: &InsuranceSourceRecord,
        allocator: &mut ReceptionNumberAllocator,
        rng: &mut R,
    ) -> Option<PatientRecord> {
        // 由随机源生成ID，固定种子下可复现
        let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();

        // 1. 新患者与问诊表
        let is_new_patient = rng.gen_bool(self.policy.new_patient_probability);
        let needs_questionnaire = is_new_patient && rng.gen_bool(self.policy.questionnaire_probability);

        // 2. 复诊患者是否需要调取病历
        let needs_medical_record = !is_new_patient && rng.gen_bool(self.policy.medical_record_probability);

        let patient_id = if is_new_patient {
            None
        } else {
            Some(match non_blank(insurance.patient_id.as_deref()) {
                Some(existing) => existing.to_string(),
                None => format!("{:06}", rng.gen_range(0..1_000_000)),
            })
        };

        // 3. 尿检
        let test_needed = triage.test_needed();

        // 4. 性别：缺失时随机抽取并写回
        let gender = insurance
            .gender
            .unwrap_or_else(|| Gender::ALL[rng.gen_range(0..Gender::ALL.len())]);

        // 5. 年龄
        let (age, age_text) = match insurance.age.as_deref().and_then(parse_leading_age) {
            Some(age) => (age, insurance.age.clone().unwrap_or_default()),
            None => {
                let age = rng.gen_range(self.policy.min_age..=self.policy.max_age);
                (age, age_label(age))
            }
        };
        let birth_date = match non_blank(insurance.birth_date.as_deref()) {
            Some(birth) => birth.to_string(),
            None => format!("{}年生", self.policy.reference_year - age as i32),
        };

        // 6. 保险证类型由字段推导
        let insurance_type = insurance.insurance_type();

        let visual_category = InsuranceCategory::from(insurance.category.as_str());
        let insurance_category = if age >= self.policy.late_elder_age {
            InsuranceCategory::LateElder
        } else {
            visual_category.clone()
        };

        // 7. 缺失字段使用占位符
        let card = InsuranceCard {
            symbol: or_placeholder(insurance.symbol.as_deref(), PLACEHOLDER_SYMBOL),
            number: or_placeholder(insurance.number.as_deref(), PLACEHOLDER_NUMBER),
            branch_number: or_placeholder(insurance.branch_number.as_deref(), PLACEHOLDER_BRANCH_NUMBER),
            burden_ratio: or_placeholder(insurance.burden_ratio.as_deref(), PLACEHOLDER_BURDEN_RATIO),
            insurer_number: or_placeholder(insurance.insurer_number.as_deref(), PLACEHOLDER_INSURER_NUMBER),
            personal_id: non_blank(insurance.personal_id.as_deref()).map(str::to_string),
        };

        // 8. 受付番号
        let reception_number = match allocator.allocate(rng) {
            Some(number) => number,
            None => {
                tracing::warn!("No reception number left, patient {} suppressed", insurance.name);
                return None;
            }
        };

        let complaint = triage.chief_complaint.clone();
        let profile = PatientProfile {
            id,
            display_name: insurance.name.clone(),
            furigana: insurance.furigana.clone(),
            gender,
            age,
            age_label: age_text,
            birth_date,
            patient_id,
            is_new_patient,
            needs_questionnaire,
            needs_medical_record,
            test_needed,
            visible_complaint: if needs_questionnaire { String::new() } else { complaint.clone() },
            hidden_complaint: complaint,
            triage: TriageDetails {
                medical_history: triage.medical_history.clone(),
                prescription: triage.prescription.clone(),
                costs: triage.costs.clone(),
                judgment_reason: triage.judgment_reason.clone(),
            },
            insurance_type,
            card,
            visual_category,
            insurance_category,
        };

        tracing::debug!(
            "Synthesized patient {} (#{}, {}, new={}, test={})",
            profile.id,
            reception_number,
            insurance_type,
            is_new_patient,
            test_needed
        );

        Some(PatientRecord::new(profile, reception_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::AllocatorSettings;
    use crate::fixtures::{insurance_source, triage_source};
    use intake_core::{InsuranceType, LATE_ELDER_LABEL};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_synthesize_carries_source_fields() {
        let synthesizer = PatientSynthesizer::default();
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(11);

        let triage = triage_source("発熱", true);
        let mut insurance = insurance_source("佐藤 花子", "国保");
        insurance.age = Some("34歳".to_string());
        insurance.gender = Some(Gender::Female);

        let record = synthesizer
            .synthesize(&triage, &insurance, &mut allocator, &mut rng)
            .unwrap();

        assert_eq!(record.profile.display_name, "佐藤 花子");
        assert_eq!(record.profile.age, 34);
        assert_eq!(record.profile.age_label, "34歳");
        assert_eq!(record.profile.gender, Gender::Female);
        assert!(record.profile.test_needed);
        assert_eq!(record.profile.hidden_complaint, "発熱");
        assert_eq!(record.profile.insurance_category, InsuranceCategory::National);
        assert!(allocator.is_issued(record.reception_number()));
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let synthesizer = PatientSynthesizer::default();
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(5);

        let insurance = InsuranceSourceRecord {
            name: "田中 一".to_string(),
            category: "社保".to_string(),
            ..Default::default()
        };
        let record = synthesizer
            .synthesize(&triage_source("咳", false), &insurance, &mut allocator, &mut rng)
            .unwrap();

        let card = &record.profile.card;
        assert_eq!(card.symbol, PLACEHOLDER_SYMBOL);
        assert_eq!(card.number, PLACEHOLDER_NUMBER);
        assert_eq!(card.branch_number, PLACEHOLDER_BRANCH_NUMBER);
        assert_eq!(card.burden_ratio, PLACEHOLDER_BURDEN_RATIO);
        assert_eq!(record.profile.insurance_type, InsuranceType::Electronic);

        let age = record.profile.age;
        assert!((20..=85).contains(&age));
        assert_eq!(record.profile.age_label, age_label(age));
    }

    #[test]
    fn test_birth_date_uses_reference_year() {
        let synthesizer = PatientSynthesizer::new(SynthesisPolicy {
            reference_year: 2030,
            ..Default::default()
        });
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(5);

        let mut insurance = insurance_source("中村 修", "国保");
        insurance.age = Some("50歳".to_string());
        insurance.birth_date = None;
        let record = synthesizer
            .synthesize(&triage_source("咳", false), &insurance, &mut allocator, &mut rng)
            .unwrap();
        assert_eq!(record.profile.birth_date, "1980年生");

        let mut other_allocator = ReceptionNumberAllocator::default();
        let mut other_rng = StdRng::seed_from_u64(5);
        let again = synthesizer
            .synthesize(&triage_source("咳", false), &insurance, &mut other_allocator, &mut other_rng)
            .unwrap();
        assert_eq!(again.profile.birth_date, record.profile.birth_date);
    }

    #[test]
    fn test_out_of_range_policy_is_sanitized() {
        let synthesizer = PatientSynthesizer::new(SynthesisPolicy {
            new_patient_probability: 1.5,
            questionnaire_probability: f64::NAN,
            medical_record_probability: -0.2,
            min_age: 80,
            max_age: 30,
            ..Default::default()
        });
        let policy = synthesizer.policy();
        assert_eq!(policy.new_patient_probability, 1.0);
        assert_eq!(policy.questionnaire_probability, 0.0);
        assert_eq!(policy.medical_record_probability, 0.0);
        assert_eq!((policy.min_age, policy.max_age), (30, 80));

        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(13);
        let insurance = InsuranceSourceRecord {
            name: "木村 亮".to_string(),
            category: "国保".to_string(),
            ..Default::default()
        };
        let record = synthesizer
            .synthesize(&triage_source("咳", false), &insurance, &mut allocator, &mut rng)
            .unwrap();
        assert!(record.profile.is_new_patient);
        assert!(!record.profile.needs_questionnaire);
        assert!((30..=80).contains(&record.profile.age));
    }

    #[test]
    fn test_new_patient_flags() {
        let policy = SynthesisPolicy {
            new_patient_probability: 1.0,
            questionnaire_probability: 1.0,
            ..Default::default()
        };
        let synthesizer = PatientSynthesizer::new(policy);
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(3);

        let mut insurance = insurance_source("高橋 健", "社保");
        insurance.patient_id = Some("004211".to_string());
        let record = synthesizer
            .synthesize(&triage_source("腹痛", false), &insurance, &mut allocator, &mut rng)
            .unwrap();

        assert!(record.profile.is_new_patient);
        assert!(record.profile.patient_id.is_none());
        assert!(record.profile.needs_questionnaire);
        assert!(!record.profile.needs_medical_record);
        assert!(record.profile.visible_complaint.is_empty());
        assert_eq!(record.profile.hidden_complaint, "腹痛");
    }

    #[test]
    fn test_returning_patient_keeps_card_id() {
        let policy = SynthesisPolicy {
            new_patient_probability: 0.0,
            medical_record_probability: 1.0,
            ..Default::default()
        };
        let synthesizer = PatientSynthesizer::new(policy);
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(3);

        let mut insurance = insurance_source("高橋 健", "社保");
        insurance.patient_id = Some("004211".to_string());
        let record = synthesizer
            .synthesize(&triage_source("腹痛", false), &insurance, &mut allocator, &mut rng)
            .unwrap();

        assert!(!record.profile.is_new_patient);
        assert_eq!(record.profile.patient_id.as_deref(), Some("004211"));
        assert!(record.profile.needs_medical_record);
        assert!(!record.profile.needs_questionnaire);
        assert_eq!(record.profile.visible_complaint, "腹痛");
    }

    #[test]
    fn test_exhausted_allocator_suppresses_patient() {
        let synthesizer = PatientSynthesizer::default();
        let mut allocator = ReceptionNumberAllocator::new(AllocatorSettings {
            universe: 1,
            weight_divisor: 10,
        });
        let mut rng = StdRng::seed_from_u64(9);
        let triage = triage_source("咳", false);
        let insurance = insurance_source("伊藤 誠", "国保");

        assert!(synthesizer.synthesize(&triage, &insurance, &mut allocator, &mut rng).is_some());
        assert!(synthesizer.synthesize(&triage, &insurance, &mut allocator, &mut rng).is_none());
    }

    #[test]
    fn test_late_elder_override() {
        let synthesizer = PatientSynthesizer::default();
        let mut allocator = ReceptionNumberAllocator::default();
        let mut rng = StdRng::seed_from_u64(21);

        for (age, printed) in [("70歳", "国保"), ("83", "社保")] {
            let mut insurance = insurance_source("渡辺 清", printed);
            insurance.age = Some(age.to_string());
            let record = synthesizer
                .synthesize(&triage_source("めまい", true), &insurance, &mut allocator, &mut rng)
                .unwrap();

            assert_eq!(record.profile.visual_category.label(), printed);
            assert_eq!(record.profile.insurance_category.label(), LATE_ELDER_LABEL);
        }

        let mut insurance = insurance_source("渡辺 清", "国保");
        insurance.age = Some("69歳".to_string());
        let record = synthesizer
            .synthesize(&triage_source("めまい", true), &insurance, &mut allocator, &mut rng)
            .unwrap();
        assert_eq!(record.profile.insurance_category, InsuranceCategory::National);
    }

    proptest! {
        #[test]
        fn insurance_type_follows_symbol_and_number(
            seed in any::<u64>(),
            symbol in proptest::option::of("[0-9]{1,4}"),
            number in proptest::option::of("[0-9]{1,6}"),
        ) {
            let synthesizer = PatientSynthesizer::default();
            let mut allocator = ReceptionNumberAllocator::default();
            let mut rng = StdRng::seed_from_u64(seed);

            let mut insurance = insurance_source("小林 光", "社保");
            insurance.symbol = symbol.clone();
            insurance.number = number.clone();

            let record = synthesizer
                .synthesize(&triage_source("咳", false), &insurance, &mut allocator, &mut rng)
                .unwrap();

            let expected = if symbol.is_some() && number.is_some() {
                InsuranceType::Paper
            } else {
                InsuranceType::Electronic
            };
            prop_assert_eq!(record.profile.insurance_type, expected);
        }

        #[test]
        fn late_elder_category_for_any_seed(seed in any::<u64>(), age in 70u32..110) {
            let synthesizer = PatientSynthesizer::default();
            let mut allocator = ReceptionNumberAllocator::default();
            let mut rng = StdRng::seed_from_u64(seed);

            let mut insurance = insurance_source("中村 誠", "国保");
            insurance.age = Some(format!("{}歳", age));

            let record = synthesizer
                .synthesize(&triage_source("咳", false), &insurance, &mut allocator, &mut rng)
                .unwrap();
            prop_assert_eq!(record.profile.insurance_category, InsuranceCategory::LateElder);
        }
    }
}
