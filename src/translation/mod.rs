//! 翻译模块
//!
//! 将页面上可见的文本节点就地翻译为目标语言：
//! - **pipeline**: 文本处理管道（过滤、收集、批次）
//! - **oracle**: 翻译端点（OpenAI Responses API 与测试用模拟端点）
//! - **core**: 翻译周期（引擎、写回、单飞服务）
//! - **scheduler**: DOM 变更的防抖调度
//! - **config**: 配置与设置
//! - **notify**: 用户可见的通知
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use page_translator::parsers::html::html_to_dom;
//! use page_translator::translation::{translate_document, TranslationConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dom = html_to_dom(b"<p>Bonjour le monde</p>", "utf-8");
//! let mut config = TranslationConfig::default();
//! config.api_key = Some("sk-...".to_string());
//!
//! let report = translate_document(&dom.document, &config).await?;
//! println!("改写了 {} 个节点", report.changed);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 翻译周期核心
pub mod core;

/// 错误处理模块
pub mod error;

/// 用户通知
pub mod notify;

/// 翻译端点
pub mod oracle;

/// 文本处理管道模块
///
/// 负责从DOM中收集可翻译文本、可见性过滤和批次划分
pub mod pipeline;

/// 变更调度
pub mod scheduler;

// ============================================================================
// 核心API导出
// ============================================================================

pub use self::core::{
    CycleOutcome, CycleReport, CycleTrigger, ServiceStats, TranslationEngine, TranslationService,
};

pub use self::config::{
    constants, ConfigManager, Settings, SettingsProvider, SettingsUpdate, StaticSettings,
    TranslationConfig,
};

pub use self::error::{ErrorSeverity, ErrorStats, TranslationError, TranslationResult};

pub use self::notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};

pub use self::oracle::{MockMode, MockOracle, OpenAiOracle, TranslationOracle};

pub use self::scheduler::{ApplyOutcome, CycleEvent, MutationScheduler, SchedulerHandle, SchedulerState};

// ============================================================================
// 高级API导出
// ============================================================================

pub use self::pipeline::{Batch, BatchManager, TextCollector, TextUnit, VisibilityFilter};

// ============================================================================
// 便利函数
// ============================================================================

/// 使用 OpenAI 端点对文档运行一次手动翻译周期
pub async fn translate_document(
    document: &markup5ever_rcdom::Handle,
    config: &TranslationConfig,
) -> TranslationResult<CycleReport> {
    let oracle = OpenAiOracle::with_timeout(&config.api_url, config.request_timeout())?;
    translate_document_with(document, config, std::sync::Arc::new(oracle)).await
}

/// 使用给定端点对文档运行一次手动翻译周期
pub async fn translate_document_with(
    document: &markup5ever_rcdom::Handle,
    config: &TranslationConfig,
    oracle: std::sync::Arc<dyn TranslationOracle>,
) -> TranslationResult<CycleReport> {
    config.validate()?;
    let settings = std::sync::Arc::new(StaticSettings::new(config.settings()));
    let service = TranslationService::new(settings, oracle, config);
    service.run_cycle(document, CycleTrigger::ApplyNow).await
}

/// 检查翻译配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}
