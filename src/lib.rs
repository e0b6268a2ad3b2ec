//! 医院前台接诊模拟引擎
//!
//! 汇总各子crate，演示程序通过这里使用引擎

pub use intake_core as core;
pub use intake_data as data;
pub use intake_workflow as workflow;
