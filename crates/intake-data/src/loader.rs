//! 源数据加载

use crate::models::SourceData;
use crate::provider::SourceDataProvider;
use intake_core::Result;

/// 读取三类源数据并生成快照
///
/// 单类读取失败时该类按空处理并记录日志，不向调用方抛出错误。
pub fn load_source_data(provider: &dyn SourceDataProvider) -> SourceData {
    let data = SourceData {
        triage: or_empty("triage", provider.triage_records()),
        electronic_insurance: or_empty("electronic insurance", provider.electronic_insurance()),
        paper_insurance: or_empty("paper insurance", provider.paper_insurance()),
    };

    if data.is_complete() {
        tracing::info!(
            "Loaded source data: {} triage, {} electronic, {} paper",
            data.triage.len(),
            data.electronic_insurance.len(),
            data.paper_insurance.len()
        );
    } else {
        tracing::warn!("Source data incomplete, patient generation will produce nothing");
    }

    data
}

fn or_empty<T>(collection: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Failed to read {} records: {}", collection, e);
            Vec::new()
        }
    }
}
