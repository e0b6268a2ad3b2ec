//! # 接诊源数据模块
//!
//! 负责提供分诊、电子保险证和纸质保险证三类只读源数据，只支持整体读取。

pub mod loader;
pub mod models;
pub mod provider;

// 重新导出主要类型
pub use loader::load_source_data;
pub use models::SourceData;
pub use provider::{InMemoryProvider, JsonDirectoryProvider, SourceDataProvider};
