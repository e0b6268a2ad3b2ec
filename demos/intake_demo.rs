//! 接诊引擎演示程序
//!
//! 展示患者生成、分诊、等待时间说明、保险确认、完成路线和评分的完整流程

use intake_core::{
    DataEntryField, PatientRecord, ReceptionTicket, StampForm, TriageDecision, TypedField, WaitTimeBand,
};
use intake_data::{load_source_data, JsonDirectoryProvider};
use intake_workflow::{CompletionRoute, InsuranceBranch, IntakeSession, IntakeSettings};

fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🏥 前台接诊引擎演示\n");

    // 1. 加载源数据
    let data = load_source_data(&JsonDirectoryProvider::new("data"));
    println!(
        "✅ 源数据加载完成: 分诊 {} 条, 电子保险证 {} 条, 纸质保险证 {} 条",
        data.triage.len(),
        data.electronic_insurance.len(),
        data.paper_insurance.len()
    );

    // 2. 生成一个班次的患者
    let mut session = IntakeSession::new(
        data,
        IntakeSettings {
            seed: Some(20240401),
            ..Default::default()
        },
    );
    let batch = session.generate_batch(5);
    if batch.is_empty() {
        anyhow::bail!("没有生成患者，请确认 data/ 目录下的源数据");
    }

    println!("✅ 生成了 {} 名患者", batch.len());
    for record in &batch {
        print_patient(record);
    }

    let stats = session.queue_stats();
    println!("\n📊 队列概览:");
    println!("   等待患者: {}", stats.total_patients);
    println!("   新患者: {}", stats.new_patients);
    println!("   待填问诊表: {}", stats.questionnaire_pending);

    // 3. 正确处理队首患者
    let first = batch[0].clone();
    println!("\n📋 处理患者 #{} {}", first.reception_number(), first.profile.display_name);
    walk_through(&mut session, &first, true)?;

    let preview = session.evaluate(first.id())?;
    println!("   评分预览: {} ({} 点)", preview.rank, preview.total_mistake_points);
    let outcome = session.finalize(first.id())?;
    println!("✅ 完成: {} 得分 {:+}", outcome.evaluation.rank, outcome.score_delta);

    // 4. 故意出错的患者
    if let Some(second) = batch.get(1).cloned() {
        println!("\n📋 处理患者 #{} {} (故意出错)", second.reception_number(), second.profile.display_name);
        walk_through(&mut session, &second, false)?;

        let outcome = session.finalize(second.id())?;
        println!("⚠️  完成: {} 得分 {:+}", outcome.evaluation.rank, outcome.score_delta);
        for mistake in &outcome.evaluation.mistake_log {
            println!("   - {} ({} 点)", mistake.reason, mistake.points);
        }
    }

    // 5. 跳号处理队尾患者
    if let Some(last) = session.queue().records().last().cloned() {
        let position = session.queue().position(last.id()).unwrap_or(0);
        println!(
            "\n⏭️  跳过 {} 名患者, 先处理 #{} (跳号扣分 {})",
            position,
            last.reception_number(),
            session.compute_skip_penalty(position)
        );
        walk_through(&mut session, &last, true)?;
        let outcome = session.finalize(last.id())?;
        println!(
            "✅ 完成: {} 基础得分 {:+}, 最终得分 {:+}",
            outcome.evaluation.rank, outcome.evaluation.score_delta, outcome.score_delta
        );
    }

    // 6. 班次结果
    println!("\n📈 班次结果:");
    println!("   完成患者: {}", session.history().len());
    println!("   剩余患者: {}", session.queue().len());
    println!("   累计得分: {}", session.score());
    if let Some(entry) = session.history().last() {
        println!("\n最后一名患者的结果 (JSON):");
        println!("{}", serde_json::to_string_pretty(&entry.outcome)?);
    }

    println!("\n🎉 接诊引擎演示完成!");
    Ok(())
}

fn print_patient(record: &PatientRecord) {
    let profile = &record.profile;
    println!(
        "   #{:>2} {} ({}, {}) {} {}{}",
        record.reception_number(),
        profile.display_name,
        profile.age_label,
        profile.gender.label(),
        profile.insurance_type,
        profile.visual_category,
        if profile.is_new_patient { " 新患" } else { "" }
    );
}

/// 按阶段处理一名患者，correct 为 false 时每个阶段都给出错误答案
fn walk_through(session: &mut IntakeSession, record: &PatientRecord, correct: bool) -> anyhow::Result<()> {
    let id = record.id();
    let profile = &record.profile;

    if record.questionnaire_pending() {
        session.complete_questionnaire(id)?;
        println!("   📝 问诊表已填写: {}", profile.hidden_complaint);
    }

    let decision = match (profile.test_needed, correct) {
        (true, true) => TriageDecision::GiveCup {
            category: profile.insurance_category.clone(),
        },
        (true, false) => TriageDecision::NoCup,
        (false, true) => TriageDecision::NoCup,
        (false, false) => TriageDecision::GiveCup {
            category: profile.visual_category.clone(),
        },
    };
    let findings = session.decide_triage(id, decision)?;
    println!("   🧪 分诊完成, 失误 {} 条", findings.len());

    let waiting = i64::from(record.reception_number()) - i64::from(session.last_finished_number());
    let band = if correct {
        WaitTimeBand::for_waiting(waiting)
    } else {
        WaitTimeBand::ThreeHoursOrMore
    };
    session.announce_wait_time(id, band)?;
    println!("   ⏱️  等待 {} 人, 说明 {:?}", waiting, band);

    match InsuranceBranch::for_profile(profile) {
        InsuranceBranch::ElectronicConfirm => {
            session.confirm_electronic_insurance(id)?;
            println!("   💳 电子保险证已确认");
        }
        InsuranceBranch::PaperDataEntry => {
            let fields = vec![
                TypedField::new(DataEntryField::Name, profile.display_name.as_str()),
                TypedField::new(DataEntryField::Furigana, profile.furigana.as_str()),
                TypedField::new(DataEntryField::BirthDate, profile.birth_date.as_str()),
                TypedField::new(DataEntryField::InsurerNumber, profile.card.insurer_number.as_str()),
                TypedField::new(DataEntryField::Symbol, profile.card.symbol.as_str()),
                TypedField::new(DataEntryField::Number, profile.card.number.as_str()),
                TypedField::new(DataEntryField::BranchNumber, profile.card.branch_number.as_str()),
            ];
            let findings = session.submit_data_entry(id, fields)?;
            println!("   ⌨️  保险证录入完成, 失误 {} 条", findings.len());
        }
        InsuranceBranch::PaperReturning => println!("   📄 复诊患者, 保险证无需录入"),
    }

    let insurance = correct.then_some(profile.insurance_type);
    match CompletionRoute::for_profile(profile) {
        CompletionRoute::MedicalRecord => {
            let card_id = profile.patient_id.clone().unwrap_or_default();
            session.retrieve_medical_record(id, &card_id)?;
            session.apply_stamps(
                id,
                StampForm {
                    date: correct,
                    insurance,
                    urine: profile.test_needed == correct,
                },
            )?;
            println!("   📁 病历已调取并盖章");
        }
        CompletionRoute::ReceptionTicket => {
            session.fill_reception_ticket(
                id,
                ReceptionTicket {
                    typed_id: profile.patient_id.clone(),
                    typed_name: Some(profile.display_name.clone()),
                    insurance,
                    urine: profile.test_needed == correct,
                },
            )?;
            println!("   🎫 受付票已填写");
        }
    }

    Ok(())
}
