//! 源数据提供者
//!
//! 接诊引擎只通过整体读取访问源数据，没有查询语言。

use intake_core::{IntakeError, InsuranceSourceRecord, Result, TriageSourceRecord};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// 分诊数据文件名
pub const TRIAGE_FILE: &str = "triage.json";
/// 电子保险证数据文件名
pub const ELECTRONIC_INSURANCE_FILE: &str = "insurance_electronic.json";
/// 纸质保险证数据文件名
pub const PAPER_INSURANCE_FILE: &str = "insurance_paper.json";

/// 源数据提供者接口
pub trait SourceDataProvider {
    fn triage_records(&self) -> Result<Vec<TriageSourceRecord>>;

    fn electronic_insurance(&self) -> Result<Vec<InsuranceSourceRecord>>;

    fn paper_insurance(&self) -> Result<Vec<InsuranceSourceRecord>>;
}

/// 内存中的源数据
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    pub triage: Vec<TriageSourceRecord>,
    pub electronic: Vec<InsuranceSourceRecord>,
    pub paper: Vec<InsuranceSourceRecord>,
}

impl InMemoryProvider {
    pub fn new(
        triage: Vec<TriageSourceRecord>,
        electronic: Vec<InsuranceSourceRecord>,
        paper: Vec<InsuranceSourceRecord>,
    ) -> Self {
        Self {
            triage,
            electronic,
            paper,
        }
    }
}

impl SourceDataProvider for InMemoryProvider {
    fn triage_records(&self) -> Result<Vec<TriageSourceRecord>> {
        Ok(self.triage.clone())
    }

    fn electronic_insurance(&self) -> Result<Vec<InsuranceSourceRecord>> {
        Ok(self.electronic.clone())
    }

    fn paper_insurance(&self) -> Result<Vec<InsuranceSourceRecord>> {
        Ok(self.paper.clone())
    }
}

/// 从目录中的 JSON 文件读取源数据
#[derive(Debug, Clone)]
pub struct JsonDirectoryProvider {
    root: PathBuf,
}

impl JsonDirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>> {
        let path = self.root.join(file_name);
        if !path.exists() {
            return Err(IntakeError::DataSource(format!(
                "source file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let records: Vec<T> = serde_json::from_str(&content)?;

        tracing::debug!("Read {} records from {}", records.len(), path.display());
        Ok(records)
    }
}

impl SourceDataProvider for JsonDirectoryProvider {
    fn triage_records(&self) -> Result<Vec<TriageSourceRecord>> {
        self.read_json(TRIAGE_FILE)
    }

    fn electronic_insurance(&self) -> Result<Vec<InsuranceSourceRecord>> {
        self.read_json(ELECTRONIC_INSURANCE_FILE)
    }

    fn paper_insurance(&self) -> Result<Vec<InsuranceSourceRecord>> {
        self.read_json(PAPER_INSURANCE_FILE)
    }
}
