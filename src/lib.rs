//! # Page Translator Library
//!
//! 将 HTML 页面中可见的文本节点就地翻译为目标语言，翻译由受 JSON schema
//! 约束的 LLM 端点完成。
//!
//! ## 模块组织
//!
//! - `env` - 类型安全的环境变量
//! - `parsers` - HTML/CSS 解析与 DOM 操作
//! - `translation` - 文本收集、批次、翻译端点、写回与变更调度

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
pub use translation::{
    translate_document, ConfigManager, CycleReport, TranslationConfig, TranslationError,
    TranslationResult, TranslationService,
};
