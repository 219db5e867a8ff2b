//! 翻译系统核心模块
//!
//! - **服务层** (`service.rs`): 一个完整的翻译周期，单飞保护
//! - **引擎层** (`engine.rs`): 批次与翻译端点之间的往返与结果对齐
//! - **写回层** (`reconciler.rs`): 将译文写回文本节点并标记已处理
//!
//! ```ignore
//! use page_translator::translation::core::{CycleTrigger, TranslationService};
//!
//! let service = TranslationService::new(settings, oracle, &config);
//! let report = service.run_cycle(&dom.document, CycleTrigger::ApplyNow).await?;
//! println!("改写了 {} 个节点", report.changed);
//! ```

pub mod engine;
pub mod reconciler;
pub mod service;

pub use engine::{
    parse_batch_translations, resolve_translations, EngineStats, EngineStatsSnapshot,
    Resolution, ResolvedTranslation, TranslationEngine,
};
pub use reconciler::{ApplyReport, DomWriter};
pub use service::{
    CycleGuard, CycleOutcome, CycleReport, CycleTrigger, ServiceStats, ServiceStatsSnapshot,
    TranslationService,
};
