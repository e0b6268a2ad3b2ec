//! # 接诊工作流模块
//!
//! 提供前台接诊模拟的核心引擎，包括：
//! - 受付番号分配：按权重抽取，小号码更常见
//! - 患者记录合成与批量生成
//! - 接诊状态机：分诊、等待时间、保险确认三个阶段
//! - 校验规则表与评分引擎

pub mod allocator;
pub mod engine;
pub mod generator;
pub mod names;
pub mod queue;
pub mod scoring;
pub mod state_machine;
pub mod synthesizer;
pub mod validation;

#[cfg(test)]
mod fixtures;

// 重新导出主要类型
pub use allocator::{AllocatorSettings, ReceptionNumberAllocator};
pub use engine::{IntakeSession, IntakeSettings};
pub use generator::PatientGenerator;
pub use names::{normalize_name, NameMatcher, NormalizedNameMatcher};
pub use queue::{ActiveQueue, HistoryEntry, IntakeOutcome, QueueStats};
pub use scoring::{Evaluation, ScoringEngine, ScoringPolicy, SkipAdjustment};
pub use state_machine::{completion_eligible, CompletionRoute, InsuranceBranch, IntakeEvent, IntakeStateMachine};
pub use synthesizer::{PatientSynthesizer, SynthesisPolicy};
pub use validation::{ValidationRoute, ValidationRule, Validator};
