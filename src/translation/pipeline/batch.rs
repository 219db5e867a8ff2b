//! 翻译批次管理器模块
//!
//! 将一个周期收集到的文本单元按固定上限切分为有序批次。
//!
//! ## 划分规则
//!
//! 对 N 个单元和批次大小 S（S ≥ 1），产出 ceil(N/S) 个批次，第 i 个批次包含
//! 单元 `[i·S, min((i+1)·S, N))`。除最后一个批次外每个批次都恰好有 S 个单元，
//! 不重复、不遗漏，并保持原有顺序。
//!
//! ## 使用示例
//!
//! ```rust
//! use page_translator::translation::pipeline::batch::chunk_items;
//!
//! let chunks = chunk_items(vec![1, 2, 3, 4, 5], 2);
//! assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use super::collector::TextUnit;
use crate::translation::config::constants;

/// 按固定大小切分序列
///
/// `chunk_size` 为 0 时按 1 处理。
pub fn chunk_items<T>(items: Vec<T>, chunk_size: usize) -> Vec<Vec<T>> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect());
    }

    chunks
}

/// 翻译批次
#[derive(Debug, Clone)]
pub struct Batch {
    /// 批次在本周期中的序号，从 0 开始
    pub index: usize,
    /// 按收集顺序排列的文本单元
    pub units: Vec<TextUnit>,
}

impl Batch {
    pub fn new(index: usize, units: Vec<TextUnit>) -> Self {
        Self { index, units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 批次中的单元序号
    pub fn ids(&self) -> Vec<usize> {
        self.units.iter().map(|u| u.local_id).collect()
    }

    /// 源文本字符总数
    pub fn total_chars(&self) -> usize {
        self.units
            .iter()
            .map(|u| u.source_text.chars().count())
            .sum()
    }

    /// 获取批次摘要
    pub fn summary(&self) -> String {
        match (self.units.first(), self.units.last()) {
            (Some(first), Some(last)) => format!(
                "批次#{}: {} 个单元 (id {}..={}), {} 字符",
                self.index,
                self.len(),
                first.local_id,
                last.local_id,
                self.total_chars()
            ),
            _ => format!("批次#{}: 空", self.index),
        }
    }
}

/// 批次统计
#[derive(Debug, Default)]
pub struct BatchStats {
    /// 输入的文本单元总数
    pub input_items: AtomicUsize,
    /// 输出的批次总数
    pub output_batches: AtomicUsize,
}

impl BatchStats {
    /// 增加输入项数
    pub fn add_input_items(&self, count: usize) {
        self.input_items.fetch_add(count, Ordering::Relaxed);
    }

    /// 增加输出批次数
    pub fn add_output_batches(&self, count: usize) {
        self.output_batches.fetch_add(count, Ordering::Relaxed);
    }

    /// 重置统计
    pub fn reset(&self) {
        self.input_items.store(0, Ordering::Relaxed);
        self.output_batches.store(0, Ordering::Relaxed);
    }

    /// 计算平均批次大小
    pub fn calculate_average_size(&self) -> f32 {
        let input_items = self.input_items.load(Ordering::Relaxed);
        let output_batches = self.output_batches.load(Ordering::Relaxed);
        if output_batches == 0 {
            0.0
        } else {
            input_items as f32 / output_batches as f32
        }
    }

    /// 获取输入项数
    pub fn get_input_items(&self) -> usize {
        self.input_items.load(Ordering::Relaxed)
    }

    /// 获取输出批次数
    pub fn get_output_batches(&self) -> usize {
        self.output_batches.load(Ordering::Relaxed)
    }
}

/// 批次管理器
#[derive(Debug)]
pub struct BatchManager {
    chunk_size: usize,
    stats: BatchStats,
}

impl BatchManager {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            stats: BatchStats::default(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 创建批次
    pub fn create_batches(&self, units: Vec<TextUnit>) -> Vec<Batch> {
        self.stats.add_input_items(units.len());

        let batches: Vec<Batch> = chunk_items(units, self.chunk_size)
            .into_iter()
            .enumerate()
            .map(|(index, units)| Batch::new(index, units))
            .collect();

        self.stats.add_output_batches(batches.len());
        tracing::debug!(
            "创建了 {} 个批次 (批次大小上限 {})",
            batches.len(),
            self.chunk_size
        );

        batches
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &BatchStats {
        &self.stats
    }

    /// 重置统计信息
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

impl Default for BatchManager {
    fn default() -> Self {
        Self::new(constants::DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes_and_order() {
        for n in 0..=13usize {
            for size in 1..=5usize {
                let items: Vec<usize> = (1..=n).collect();
                let chunks = chunk_items(items.clone(), size);

                assert_eq!(chunks.len(), n.div_ceil(size), "n={} size={}", n, size);
                for (i, chunk) in chunks.iter().enumerate() {
                    if i + 1 < chunks.len() {
                        assert_eq!(chunk.len(), size);
                    } else {
                        assert!(!chunk.is_empty() && chunk.len() <= size);
                    }
                }

                let flattened: Vec<usize> = chunks.into_iter().flatten().collect();
                assert_eq!(flattened, items);
            }
        }
    }

    #[test]
    fn test_zero_chunk_size_is_treated_as_one() {
        assert_eq!(chunk_items(vec!['a', 'b'], 0), vec![vec!['a'], vec!['b']]);
        assert_eq!(BatchManager::new(0).chunk_size(), 1);
    }

    #[test]
    fn test_exact_multiple() {
        let chunks = chunk_items((0..120).collect::<Vec<_>>(), 60);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 60);
    }
}
