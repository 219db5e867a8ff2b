//! 翻译配置管理模块
//!
//! 提供配置文件、环境变量和默认值的统一加载，以及周期开始时读取的设置接口

pub mod manager;
pub mod settings;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};
pub use settings::{Settings, SettingsProvider, SettingsUpdate, StaticSettings};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 默认设置
    pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/responses";
    pub const DEFAULT_TARGET_LANG: &str = "English";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_AUTO_TRANSLATE: bool = true;

    // 批次处理相关
    pub const DEFAULT_CHUNK_SIZE: usize = 60;
    pub const MAX_CHUNK_SIZE: usize = 1000;

    // 调度相关
    pub const DEFAULT_DEBOUNCE_MS: u64 = 350;
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "code", "pre", "textarea", "input", "select", "option",
        "iframe",
    ];

    // 结构化输出的模式名称
    pub const RESPONSE_SCHEMA_NAME: &str = "BatchTranslations";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "page-translator.toml",
        ".page-translator.toml",
        "page-translator.json",
        "~/.config/page-translator/config.toml",
        "/etc/page-translator/config.toml",
    ];

    // .env 文件搜索顺序
    pub const ENV_FILES: &[&str] = &[".env.local", ".env.development", ".env.production", ".env"];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
