//! 无界面班次模拟主程序

mod operator;

use anyhow::{Context, Result};
use clap::Parser;
use intake_admin::{ConfigManager, SessionReport};
use intake_data::{load_source_data, JsonDirectoryProvider};
use intake_workflow::IntakeSession;
use operator::ScriptedOperator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

/// 班次模拟命令行参数
#[derive(Parser, Debug)]
#[command(name = "intake-shift")]
#[command(about = "医院前台接诊班次模拟")]
struct Args {
    /// 源数据目录，覆盖配置文件中的 session.data_dir
    #[arg(short, long)]
    data_dir: Option<String>,

    /// 配置文件路径
    #[arg(short, long, default_value = "config/intake.toml")]
    config: String,

    /// 日志级别，覆盖配置文件中的 logging.level
    #[arg(short, long)]
    log_level: Option<String>,

    /// 患者数
    #[arg(short, long)]
    patients: Option<usize>,

    /// 随机种子
    #[arg(short, long)]
    seed: Option<u64>,

    /// 操作员每个判断答对的概率
    #[arg(short, long, default_value = "0.9", value_parser = parse_accuracy)]
    accuracy: f64,

    /// 以JSON输出报告
    #[arg(long)]
    json: bool,
}

/// 准确率必须是 [0, 1] 内的有限数
fn parse_accuracy(value: &str) -> std::result::Result<f64, String> {
    let accuracy: f64 = value
        .parse()
        .map_err(|e| format!("invalid accuracy '{}': {}", value, e))?;
    if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
        return Err(format!("accuracy must be between 0 and 1, got {}", value));
    }
    Ok(accuracy)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    let config = manager.get_config().clone();

    // 初始化日志
    let log_level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(&log_level).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(&log_level).init();
    }

    info!("启动接诊班次模拟...");

    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.session.data_dir.clone());
    let data = load_source_data(&JsonDirectoryProvider::new(&data_dir));

    let mut settings = config.settings();
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    let patients = args.patients.unwrap_or(config.session.batch_size);

    info!("班次配置:");
    info!("  数据目录: {}", data_dir);
    info!("  患者数: {}", patients);
    info!("  操作员准确率: {}", args.accuracy);

    let operator_rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    let mut session = IntakeSession::new(data, settings);
    let batch = session.generate_batch(patients);
    if batch.is_empty() {
        anyhow::bail!("No patients generated, check the source data in {}", data_dir);
    }

    let mut operator = ScriptedOperator::new(args.accuracy, operator_rng);
    while let Some(outcome) = operator.process_next(&mut session)? {
        if outcome.evaluation.rank == intake_core::Rank::Bad {
            warn!(
                "Patient #{} graded bad ({} points)",
                outcome.reception_number, outcome.evaluation.total_mistake_points
            );
        }
    }

    let report = SessionReport::from_session(&session);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    info!("班次结束, 得分 {}", session.score());
    Ok(())
}
