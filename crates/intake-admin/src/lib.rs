//! # 接诊管理模块
//!
//! 提供配置管理和班次报告等运维功能

pub mod config;
pub mod report;

pub use config::{ConfigManager, ConfigValidator, IntakeConfig, LoggingConfig, ScoringConfig, SessionConfig, SynthesisConfig};
pub use report::{MistakeFrequency, SessionReport, SessionSummary};
