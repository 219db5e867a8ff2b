//! DOM 写回
//!
//! 将一个批次的最终译文写回对应的文本节点，并把节点标记为已处理。
//! 只有译文非空且与节点当前的文本不同时才写入；无论是否写入都会标记。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{get_parent_node, get_text, set_text};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{Batch, TextCollector};

use super::engine::ResolvedTranslation;

/// 一个批次的写回结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// 文本被改写的节点数
    pub changed: usize,
    /// 被标记为已处理的节点数
    pub marked: usize,
    /// 写回前已脱离文档或被销毁的节点数（不标记）
    pub detached: usize,
}

impl ApplyReport {
    pub fn merge(&mut self, other: ApplyReport) {
        self.changed += other.changed;
        self.marked += other.marked;
        self.detached += other.detached;
    }
}

/// DOM 写回器
#[derive(Debug, Clone, Copy)]
pub struct DomWriter {
    preserve_whitespace: bool,
}

impl DomWriter {
    /// `preserve_whitespace` 为真时保留节点原有的首尾空白，只替换其中的文字
    pub fn new(preserve_whitespace: bool) -> Self {
        Self { preserve_whitespace }
    }

    /// 写回一个批次
    ///
    /// `resolved` 必须与批次等长且 id 逐一对应，否则返回 `InternalError` 且不做任何修改。
    ///
    /// 保留空白时写入的是“原有首尾空白 + 去空白后的译文”，并与当前文本比较决定是否计入
    /// `changed`。因此回退到源文本的 `"\n  Hello\n"` 不会被改写，`changed` 为 0；
    /// 关闭保留空白时才按原样写入译文本身。
    pub fn apply_batch(
        &self,
        collector: &mut TextCollector,
        batch: &Batch,
        resolved: &[ResolvedTranslation],
    ) -> TranslationResult<ApplyReport> {
        if resolved.len() != batch.len() {
            return Err(TranslationError::InternalError(format!(
                "批次#{} 结果数量不匹配: 期望 {}, 实际 {}",
                batch.index,
                batch.len(),
                resolved.len()
            )));
        }

        if let Some((unit, result)) = batch
            .units
            .iter()
            .zip(resolved)
            .find(|(unit, result)| unit.local_id != result.local_id)
        {
            return Err(TranslationError::InternalError(format!(
                "批次#{} 结果顺序错乱: 单元 {} 对应结果 {}",
                batch.index, unit.local_id, result.local_id
            )));
        }

        let mut report = ApplyReport::default();

        for (unit, result) in batch.units.iter().zip(resolved) {
            let Some(node) = attached(unit.handle()) else {
                report.detached += 1;
                continue;
            };

            if self.write(&node, &result.text) {
                report.changed += 1;
            }

            collector.mark_done(&node);
            report.marked += 1;
        }

        tracing::debug!(
            "批次#{}: 改写 {} 个节点, 标记 {} 个, 跳过 {} 个已脱离节点",
            batch.index,
            report.changed,
            report.marked,
            report.detached
        );

        Ok(report)
    }

    /// 写入单个节点，返回是否改写
    fn write(&self, node: &Handle, translated: &str) -> bool {
        let Some(live) = get_text(node) else {
            return false;
        };

        // 只含空白的译文与空译文一样不写入，节点仍会被标记
        let core = translated.trim();
        if core.is_empty() {
            return false;
        }

        let new_text = if self.preserve_whitespace {
            let leading = &live[..live.len() - live.trim_start().len()];
            let trailing = &live[live.trim_end().len()..];
            format!("{}{}{}", leading, core, trailing)
        } else {
            translated.to_string()
        };

        if new_text == live {
            return false;
        }

        set_text(node, &new_text)
    }
}

impl Default for DomWriter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn attached(handle: Option<Handle>) -> Option<Handle> {
    handle.filter(|node| get_parent_node(node).is_some())
}
