//! 错误定义模块

use thiserror::Error;

/// 接诊系统统一错误类型
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据源错误: {0}")]
    DataSource(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("问诊表尚未完成: 受付番号 {0}")]
    QuestionnairePending(u32),

    #[error("无效操作: {0}")]
    InvalidAction(String),

    #[error("无效阶段转换: 从 {from} 到 {event}")]
    InvalidStageTransition { from: String, event: String },
}

/// 接诊系统统一结果类型
pub type Result<T> = std::result::Result<T, IntakeError>;
