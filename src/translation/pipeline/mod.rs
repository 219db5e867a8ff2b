//! 翻译管道模块
//!
//! 提供文本处理管道，包括过滤、收集和批次划分

pub mod batch;
pub mod collector;
pub mod filters;

// 重新导出主要类型
pub use batch::{chunk_items, Batch, BatchManager, BatchStats};
pub use collector::{CollectionStats, ProcessedSet, TextCollector, TextNodeWalker, TextUnit, TextUnits};
pub use filters::{is_rendered, Rejection, VisibilityFilter};
