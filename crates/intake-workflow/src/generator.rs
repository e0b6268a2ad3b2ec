//! 患者批量生成
//!
//! 分诊源数据不放回抽取，保险证源数据从电子与纸质合并池中有放回抽取

use intake_core::PatientRecord;
use intake_data::SourceData;
use rand::Rng;
use std::collections::HashSet;

use crate::allocator::ReceptionNumberAllocator;
use crate::synthesizer::PatientSynthesizer;

/// 患者生成器
#[derive(Debug, Clone)]
pub struct PatientGenerator {
    synthesizer: PatientSynthesizer,
    used_triage: HashSet<usize>,
}

impl PatientGenerator {
    pub fn new(synthesizer: PatientSynthesizer) -> Self {
        Self {
            synthesizer,
            used_triage: HashSet::new(),
        }
    }

    pub fn synthesizer(&self) -> &PatientSynthesizer {
        &self.synthesizer
    }

    /// 已使用的分诊源数据数量
    pub fn used_triage_count(&self) -> usize {
        self.used_triage.len()
    }

    /// 清空已使用的分诊源数据
    pub fn reset(&mut self) {
        self.used_triage.clear();
    }

    /// 批量生成，结果按受付番号排序
    ///
    /// 重置分配器和已使用的分诊数据。源数据不完整时返回空。
    pub fn generate_batch<R: Rng + ?Sized>(
        &mut self,
        data: &SourceData,
        count: usize,
        allocator: &mut ReceptionNumberAllocator,
        rng: &mut R,
    ) -> Vec<PatientRecord> {
        allocator.reset();
        self.reset();

        if !data.is_complete() {
            tracing::warn!(
                "Source data incomplete (triage={}, electronic={}, paper={}), no patients generated",
                data.triage.len(),
                data.electronic_insurance.len(),
                data.paper_insurance.len()
            );
            return Vec::new();
        }

        let mut batch = Vec::with_capacity(count);
        while batch.len() < count {
            match self.draw(data, allocator, rng) {
                Some(record) => batch.push(record),
                None => break,
            }
        }

        if batch.len() < count {
            tracing::warn!("Requested {} patients, generated {}", count, batch.len());
        }

        batch.sort_by_key(PatientRecord::reception_number);
        tracing::info!("Generated batch of {} patients", batch.len());
        batch
    }

    /// 追加生成一名患者，不重置分配器
    pub fn generate_one<R: Rng + ?Sized>(
        &mut self,
        data: &SourceData,
        allocator: &mut ReceptionNumberAllocator,
        rng: &mut R,
    ) -> Option<PatientRecord> {
        if !data.is_complete() {
            tracing::warn!("Source data incomplete, no patient generated");
            return None;
        }
        self.draw(data, allocator, rng)
    }

    fn draw<R: Rng + ?Sized>(
        &mut self,
        data: &SourceData,
        allocator: &mut ReceptionNumberAllocator,
        rng: &mut R,
    ) -> Option<PatientRecord> {
        let available: Vec<usize> = (0..data.triage.len())
            .filter(|index| !self.used_triage.contains(index))
            .collect();
        if available.is_empty() {
            tracing::warn!("All {} triage entries used", data.triage.len());
            return None;
        }

        let triage_index = available[rng.gen_range(0..available.len())];
        let insurance = data.insurance_at(rng.gen_range(0..data.insurance_len()))?;

        let record = self
            .synthesizer
            .synthesize(&data.triage[triage_index], insurance, allocator, rng)?;
        self.used_triage.insert(triage_index);
        Some(record)
    }
}
