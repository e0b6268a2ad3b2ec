//! # Intake Core
//!
//! 接诊引擎的核心模块，提供源数据与患者记录的数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{IntakeError, Result};
pub use models::*;
