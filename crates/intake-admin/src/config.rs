//! 配置管理
//!
//! 提供统一的配置管理功能，支持文件与环境变量叠加、验证和保存

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use intake_workflow::{AllocatorSettings, IntakeSettings, ScoringPolicy, SynthesisPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 环境变量前缀，例如 `INTAKE__SESSION__SEED=7`
pub const ENV_PREFIX: &str = "INTAKE";
pub const ENV_SEPARATOR: &str = "__";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: IntakeConfig,
    /// 配置文件路径
    config_path: PathBuf,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 接诊系统完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// 班次配置
    pub session: SessionConfig,
    /// 患者合成配置
    pub synthesis: SynthesisConfig,
    /// 评分配置
    pub scoring: ScoringConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 班次配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 源数据目录
    pub data_dir: String,
    /// 受付番号范围 1..=reception_universe
    pub reception_universe: u32,
    /// 受付番号权重步长
    pub weight_divisor: u32,
    /// 每个班次的患者数
    pub batch_size: usize,
    /// 随机种子
    pub seed: Option<u64>,
}

/// 患者合成配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub new_patient_probability: f64,
    pub questionnaire_probability: f64,
    pub medical_record_probability: f64,
    pub min_age: u32,
    pub max_age: u32,
    /// 後期高齢者的年龄阈值
    pub late_elder_age: u32,
    pub reference_year: i32,
}

/// 评分配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub perfect_max: u32,
    pub warning_max: u32,
    pub perfect_delta: i32,
    pub warning_delta: i32,
    pub bad_delta: i32,
    pub skip_penalty_per_position: u32,
    pub data_entry_ceiling: u32,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式: text 或 json
    pub format: String,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: String,
    /// 验证函数
    validator: fn(&IntakeConfig) -> Result<()>,
    /// 错误消息
    error_message: String,
}

impl ConfigManager {
    /// 创建新的配置管理器
    ///
    /// 配置文件不存在时使用默认值，环境变量覆盖文件中的值。
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = Self::load_config(&config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config,
            config_path,
            validator,
        })
    }

    /// 从文件和环境变量加载配置
    fn load_config(config_path: &Path) -> Result<IntakeConfig> {
        let path = config_path
            .to_str()
            .with_context(|| format!("Configuration path is not valid UTF-8: {}", config_path.display()))?;

        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: IntakeConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded from: {}", config_path.display());
        Ok(config)
    }

    /// 获取配置
    pub fn get_config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 更新配置并写回文件
    pub fn update_config(&mut self, new_config: IntakeConfig) -> Result<()> {
        self.validator.validate(&new_config)?;
        self.config = new_config;
        self.save_config()?;

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_config(&self) -> Result<()> {
        let config_str = toml::to_string_pretty(&self.config).context("Failed to serialize configuration")?;

        std::fs::write(&self.config_path, config_str).context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", self.config_path.display());
        Ok(())
    }

    /// 重新加载配置
    pub fn reload_config(&mut self) -> Result<()> {
        let new_config = Self::load_config(&self.config_path)?;
        self.validator.validate(&new_config)?;
        self.config = new_config;
        Ok(())
    }

    /// 按点分路径读取配置值，例如 `scoring.perfect_max`
    pub fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config_json = serde_json::to_value(&self.config).context("Failed to serialize config to JSON")?;

        let mut current = &config_json;
        for part in path.split('.') {
            current = current
                .get(part)
                .with_context(|| format!("Configuration path not found: {}", path))?;
        }

        serde_json::from_value(current.clone()).context("Failed to deserialize configuration value")
    }

    /// 按点分路径设置配置值，验证失败时保持原配置
    pub fn set_value<T>(&mut self, path: &str, value: T) -> Result<()>
    where
        T: Serialize,
    {
        let value_json = serde_json::to_value(value).context("Failed to serialize value")?;
        let mut config_json = serde_json::to_value(&self.config).context("Failed to serialize config to JSON")?;

        let mut current = &mut config_json;
        for part in path.split('.') {
            current = current
                .get_mut(part)
                .with_context(|| format!("Configuration path not found: {}", path))?;
        }
        *current = value_json;

        let new_config: IntakeConfig =
            serde_json::from_value(config_json).context("Failed to apply configuration value")?;
        self.validator.validate(&new_config)?;
        self.config = new_config;

        info!("Configuration value updated: {}", path);
        Ok(())
    }

    /// 验证配置
    pub fn validate_config(&self) -> Result<()> {
        self.validator.validate(&self.config)
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "session.reception_universe".to_string(),
                validator: |config| {
                    if config.session.reception_universe == 0 {
                        Err(anyhow::anyhow!("Reception universe cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid reception universe".to_string(),
            },
            ValidationRule {
                field_path: "session.weight_divisor".to_string(),
                validator: |config| {
                    if config.session.weight_divisor == 0 {
                        Err(anyhow::anyhow!("Weight divisor cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid weight divisor".to_string(),
            },
            ValidationRule {
                field_path: "synthesis".to_string(),
                validator: |config| {
                    let synthesis = &config.synthesis;
                    let probabilities = [
                        ("new_patient_probability", synthesis.new_patient_probability),
                        ("questionnaire_probability", synthesis.questionnaire_probability),
                        ("medical_record_probability", synthesis.medical_record_probability),
                    ];
                    for (name, value) in probabilities {
                        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                            return Err(anyhow::anyhow!("{} must be within [0, 1], got {}", name, value));
                        }
                    }
                    Ok(())
                },
                error_message: "Invalid synthesis probability".to_string(),
            },
            ValidationRule {
                field_path: "synthesis.min_age".to_string(),
                validator: |config| {
                    if config.synthesis.min_age > config.synthesis.max_age {
                        Err(anyhow::anyhow!(
                            "min_age {} exceeds max_age {}",
                            config.synthesis.min_age,
                            config.synthesis.max_age
                        ))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid age range".to_string(),
            },
            ValidationRule {
                field_path: "scoring.perfect_max".to_string(),
                validator: |config| {
                    if config.scoring.perfect_max > config.scoring.warning_max {
                        Err(anyhow::anyhow!("perfect_max cannot exceed warning_max"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid rank thresholds".to_string(),
            },
            ValidationRule {
                field_path: "logging.format".to_string(),
                validator: |config| match config.logging.format.as_str() {
                    "text" | "json" => Ok(()),
                    other => Err(anyhow::anyhow!("Unknown log format: {}", other)),
                },
                error_message: "Invalid log format".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &IntakeConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeConfig {
    /// 转换为会话设置
    pub fn settings(&self) -> IntakeSettings {
        IntakeSettings {
            allocator: self.session.allocator_settings(),
            synthesis: self.synthesis.policy(),
            scoring: self.scoring.policy(),
            seed: self.session.seed,
        }
    }
}

impl SessionConfig {
    pub fn allocator_settings(&self) -> AllocatorSettings {
        AllocatorSettings {
            universe: self.reception_universe,
            weight_divisor: self.weight_divisor,
        }
    }
}

impl SynthesisConfig {
    pub fn policy(&self) -> SynthesisPolicy {
        SynthesisPolicy {
            new_patient_probability: self.new_patient_probability,
            questionnaire_probability: self.questionnaire_probability,
            medical_record_probability: self.medical_record_probability,
            min_age: self.min_age,
            max_age: self.max_age,
            late_elder_age: self.late_elder_age,
            reference_year: self.reference_year,
        }
    }
}

impl ScoringConfig {
    pub fn policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            perfect_max: self.perfect_max,
            warning_max: self.warning_max,
            perfect_delta: self.perfect_delta,
            warning_delta: self.warning_delta,
            bad_delta: self.bad_delta,
            skip_penalty_per_position: self.skip_penalty_per_position,
            data_entry_ceiling: self.data_entry_ceiling,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let allocator = AllocatorSettings::default();
        Self {
            data_dir: "./data".to_string(),
            reception_universe: allocator.universe,
            weight_divisor: allocator.weight_divisor,
            batch_size: 10,
            seed: None,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        let policy = SynthesisPolicy::default();
        Self {
            new_patient_probability: policy.new_patient_probability,
            questionnaire_probability: policy.questionnaire_probability,
            medical_record_probability: policy.medical_record_probability,
            min_age: policy.min_age,
            max_age: policy.max_age,
            late_elder_age: policy.late_elder_age,
            reference_year: policy.reference_year,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let policy = ScoringPolicy::default();
        Self {
            perfect_max: policy.perfect_max,
            warning_max: policy.warning_max,
            perfect_delta: policy.perfect_delta,
            warning_delta: policy.warning_delta,
            bad_delta: policy.bad_delta,
            skip_penalty_per_position: policy.skip_penalty_per_position,
            data_entry_ceiling: policy.data_entry_ceiling,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path().join("absent.toml")).unwrap();

        assert_eq!(manager.get_config(), &IntakeConfig::default());
        assert_eq!(manager.get_config().settings(), IntakeSettings::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intake.toml");
        std::fs::write(
            &path,
            "[session]\nbatch_size = 25\nseed = 99\n\n[scoring]\nperfect_max = 3\n",
        )
        .unwrap();

        let manager = ConfigManager::new(&path).unwrap();
        let config = manager.get_config();
        assert_eq!(config.session.batch_size, 25);
        assert_eq!(config.session.seed, Some(99));
        assert_eq!(config.session.reception_universe, 50);
        assert_eq!(config.scoring.perfect_max, 3);
        assert_eq!(config.scoring.warning_max, 15);

        let settings = config.settings();
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.scoring.perfect_max, 3);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intake.toml");
        let mut manager = ConfigManager::new(&path).unwrap();

        let mut updated = IntakeConfig::default();
        updated.synthesis.late_elder_age = 75;
        updated.logging.format = "json".to_string();
        manager.update_config(updated.clone()).unwrap();
        assert!(path.exists());

        manager.reload_config().unwrap();
        assert_eq!(manager.get_config(), &updated);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intake.toml");
        std::fs::write(&path, "[synthesis]\nnew_patient_probability = 1.5\n").unwrap();

        assert!(ConfigManager::new(&path).is_err());

        let mut manager = ConfigManager::new(dir.path().join("other.toml")).unwrap();
        let mut bad = IntakeConfig::default();
        bad.scoring.perfect_max = 20;
        assert!(manager.update_config(bad).is_err());
        assert_eq!(manager.get_config(), &IntakeConfig::default());
    }

    #[test]
    fn test_get_and_set_value() {
        let dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("intake.toml")).unwrap();

        let perfect_max: u32 = manager.get_value("scoring.perfect_max").unwrap();
        assert_eq!(perfect_max, 5);

        manager.set_value("session.batch_size", 30).unwrap();
        assert_eq!(manager.get_config().session.batch_size, 30);

        assert!(manager.set_value("session.weight_divisor", 0).is_err());
        assert_eq!(manager.get_config().session.weight_divisor, 10);
        assert!(manager.get_value::<u32>("session.unknown").is_err());
    }

    #[test]
    fn test_validator_rules() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&IntakeConfig::default()).is_ok());

        let mut config = IntakeConfig::default();
        config.synthesis.min_age = 90;
        assert!(validator.validate(&config).is_err());

        let mut config = IntakeConfig::default();
        config.logging.format = "yaml".to_string();
        assert!(validator.validate(&config).is_err());
    }
}
