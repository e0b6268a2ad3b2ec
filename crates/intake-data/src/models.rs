//! 源数据快照

use intake_core::{InsuranceSourceRecord, TriageSourceRecord};
use serde::{Deserialize, Serialize};

/// 一次会话使用的源数据快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceData {
    pub triage: Vec<TriageSourceRecord>,
    pub electronic_insurance: Vec<InsuranceSourceRecord>,
    pub paper_insurance: Vec<InsuranceSourceRecord>,
}

impl SourceData {
    /// 三类数据任何一类为空都视为不可用
    pub fn is_complete(&self) -> bool {
        !self.triage.is_empty() && !self.electronic_insurance.is_empty() && !self.paper_insurance.is_empty()
    }

    /// 电子与纸质保险证合并后的候选总数
    pub fn insurance_len(&self) -> usize {
        self.electronic_insurance.len() + self.paper_insurance.len()
    }

    /// 按合并后的下标取保险源数据，电子在前，纸质在后
    pub fn insurance_at(&self, index: usize) -> Option<&InsuranceSourceRecord> {
        let electronic = self.electronic_insurance.len();
        if index < electronic {
            self.electronic_insurance.get(index)
        } else {
            self.paper_insurance.get(index - electronic)
        }
    }
}
