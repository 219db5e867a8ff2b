//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use super::settings::{Settings, SettingsProvider, SettingsUpdate};
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 凭据与端点
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_url: String,

    // 周期设置
    pub target_lang: String,
    pub model: String,
    pub auto_translate: bool,

    // 流水线配置
    pub chunk_size: usize,
    pub debounce_ms: u64,
    /// 为空时沿用传输层默认超时
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub skip_elements: Vec<String>,
    pub min_text_length: usize,
    pub respect_page_lang: bool,
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, api_url: Option<&str>) -> Self {
        let mut config = Self::default();
        config.target_lang = target_lang.to_string();
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.chunk_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.debounce_ms == 0 {
            return Err(TranslationError::ConfigError("防抖间隔不能为0".to_string()));
        }

        if self.min_text_length == 0 {
            return Err(TranslationError::ConfigError("最小文本长度不能为0".to_string()));
        }

        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(TranslationError::ConfigError("模型标识不能为空".to_string()));
        }

        if let Some(0) = self.request_timeout_secs {
            return Err(TranslationError::ConfigError("请求超时不能为0".to_string()));
        }

        url::Url::parse(&self.api_url).map_err(|e| {
            TranslationError::ConfigError(format!("API URL 无效 '{}': {}", self.api_url, e))
        })?;

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{translation, EnvVar};

        if let Ok(api_key) = translation::ApiKey::get() {
            self.api_key = Some(api_key);
            tracing::debug!("环境变量提供了 API 密钥");
        }

        if let Ok(api_url) = translation::ApiUrl::get() {
            self.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }

        if let Ok(target_lang) = translation::TargetLang::get() {
            self.target_lang = target_lang;
        }

        if let Ok(model) = translation::Model::get() {
            self.model = model;
        }

        if std::env::var(translation::AutoTranslate::NAME).is_ok() {
            match translation::AutoTranslate::get() {
                Ok(auto_translate) => self.auto_translate = auto_translate,
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        if let Ok(chunk_size) = translation::ChunkSize::get() {
            self.chunk_size = chunk_size;
        }

        if let Ok(debounce_ms) = translation::DebounceMs::get() {
            self.debounce_ms = debounce_ms;
        }
    }

    /// 当前周期设置快照
    pub fn settings(&self) -> Settings {
        Settings {
            api_key: self.api_key.clone().unwrap_or_default(),
            target_lang: self.target_lang.clone(),
            model: self.model.clone(),
            auto_translate: self.auto_translate,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: constants::DEFAULT_API_URL.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            model: constants::DEFAULT_MODEL.to_string(),
            auto_translate: constants::DEFAULT_AUTO_TRANSLATE,
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            debounce_ms: constants::DEFAULT_DEBOUNCE_MS,
            request_timeout_secs: None,
            skip_elements: constants::SKIP_ELEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_text_length: constants::MIN_TEXT_LENGTH,
            respect_page_lang: true,
        }
    }
}

/// 配置管理器
///
/// 同时充当设置提供者，设置命令在进程内修改配置，`save` 可选地写回文件。
#[derive(Debug)]
pub struct ConfigManager {
    config: RwLock<TranslationConfig>,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 按搜索路径加载配置并应用环境变量
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (mut config, source_path) = match Self::find_config_file() {
            Some(path) => {
                tracing::info!("加载配置文件: {}", path.display());
                (Self::load_from_file(&path)?, Some(path))
            }
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                (TranslationConfig::default(), None)
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config: RwLock::new(config),
            source_path,
        })
    }

    /// 从指定文件加载配置，环境变量仍然生效
    pub fn from_file(path: impl AsRef<Path>) -> TranslationResult<Self> {
        Self::load_dotenv();

        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config: RwLock::new(config),
            source_path: Some(path),
        })
    }

    /// 使用已构造好的配置
    pub fn from_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            source_path: None,
        })
    }

    /// 获取配置副本
    pub fn config(&self) -> TranslationResult<TranslationConfig> {
        Ok(self.read()?.clone())
    }

    /// 配置来源文件
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// 设置 API 密钥，空字符串会清除凭据
    pub fn set_api_key(&self, api_key: &str) -> TranslationResult<()> {
        let trimmed = api_key.trim();
        self.write()?.api_key = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        tracing::info!("API 密钥已更新");
        Ok(())
    }

    /// 更新周期设置
    pub fn update_settings(&self, update: &SettingsUpdate) -> TranslationResult<Settings> {
        update.validate()?;

        let mut config = self.write()?;
        if let Some(target_lang) = &update.target_lang {
            config.target_lang = target_lang.trim().to_string();
        }
        if let Some(model) = &update.model {
            config.model = model.trim().to_string();
        }
        if let Some(auto_translate) = update.auto_translate {
            config.auto_translate = auto_translate;
        }

        tracing::info!(
            "设置已更新: 目标语言={}, 模型={}, 自动翻译={}",
            config.target_lang,
            config.model,
            config.auto_translate
        );
        Ok(config.settings())
    }

    /// 将当前配置写入文件（默认为加载来源）
    pub fn save(&self, path: Option<&Path>) -> TranslationResult<PathBuf> {
        let target = match path.or(self.source_path.as_deref()) {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(constants::CONFIG_PATHS[0]),
        };

        let config = self.config()?;
        let content = if target.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(&config)
                .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?
        } else {
            toml::to_string_pretty(&config)
                .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?
        };

        std::fs::write(&target, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;
        tracing::info!("配置已保存: {}", target.display());

        Ok(target)
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: impl AsRef<Path>) -> TranslationResult<()> {
        std::fs::write(path.as_ref(), Self::example_config()?)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 示例配置内容
    pub fn example_config() -> TranslationResult<String> {
        toml::to_string_pretty(&TranslationConfig::default())
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))
    }

    fn find_config_file() -> Option<PathBuf> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).into_owned()))
            .find(|path| path.exists())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    fn read(&self) -> TranslationResult<RwLockReadGuard<'_, TranslationConfig>> {
        self.config
            .read()
            .map_err(|_| TranslationError::InternalError("配置锁已损坏".to_string()))
    }

    fn write(&self) -> TranslationResult<RwLockWriteGuard<'_, TranslationConfig>> {
        self.config
            .write()
            .map_err(|_| TranslationError::InternalError("配置锁已损坏".to_string()))
    }
}

impl SettingsProvider for ConfigManager {
    fn get_settings(&self) -> TranslationResult<Settings> {
        Ok(self.read()?.settings())
    }
}
