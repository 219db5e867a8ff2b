//! 文本收集器模块
//!
//! 按文档顺序遍历 DOM，产出可翻译且尚未处理的文本单元。
//! 已处理节点记录在收集器持有的 [`ProcessedSet`] 中，而不是写回节点本身。

use std::collections::HashMap;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData, WeakHandle};

use super::filters::{Rejection, VisibilityFilter};

/// 一个待翻译的文本单元
#[derive(Debug, Clone)]
pub struct TextUnit {
    /// 周期内的序号，从 1 开始，按遍历顺序分配
    pub local_id: usize,
    /// 收集时去除首尾空白的文本，之后不再变化
    pub source_text: String,
    /// 文本节点的非拥有引用
    pub node: WeakHandle,
}

impl TextUnit {
    pub fn new(local_id: usize, source_text: impl Into<String>, node: &Handle) -> Self {
        Self {
            local_id,
            source_text: source_text.into(),
            node: Rc::downgrade(node),
        }
    }

    /// 节点仍然存活时返回其句柄
    pub fn handle(&self) -> Option<Handle> {
        self.node.upgrade()
    }

    /// 发送给翻译端点的字符串 id
    pub fn wire_id(&self) -> String {
        self.local_id.to_string()
    }
}

/// 已处理节点集合
///
/// 以节点地址为键保存弱引用。集合持有的 `Weak` 会让分配保持存在，
/// 因此同一地址不会被另一个节点复用；节点销毁后其条目永远不会再命中，
/// 可以通过 [`ProcessedSet::prune`] 清理。
#[derive(Debug, Default)]
pub struct ProcessedSet {
    entries: HashMap<usize, WeakHandle>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(node: &Handle) -> usize {
        Rc::as_ptr(node) as usize
    }

    /// 标记节点已处理，首次标记时返回 `true`
    pub fn mark(&mut self, node: &Handle) -> bool {
        self.entries
            .insert(Self::key(node), Rc::downgrade(node))
            .is_none()
    }

    /// 节点是否已处理
    pub fn contains(&self, node: &Handle) -> bool {
        self.entries.contains_key(&Self::key(node))
    }

    /// 清理已销毁节点的条目，返回清理数量
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 忘记所有标记（例如页面导航后）
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// 文本节点遍历器
///
/// 惰性的前序深度优先遍历，只产出文本节点。遍历使用显式栈，不会递归。
pub struct TextNodeWalker {
    stack: Vec<Handle>,
}

impl TextNodeWalker {
    pub fn new(root: &Handle) -> Self {
        Self {
            stack: vec![root.clone()],
        }
    }
}

impl Iterator for TextNodeWalker {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        while let Some(node) = self.stack.pop() {
            self.stack
                .extend(node.children.borrow().iter().rev().cloned());

            if let NodeData::Text { .. } = node.data {
                return Some(node);
            }
        }
        None
    }
}

/// 收集统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub text_nodes_seen: usize,
    pub already_done: usize,
    pub hidden: usize,
    pub excluded_tag: usize,
    pub too_short: usize,
    pub detached: usize,
    pub empty_after_trim: usize,
    pub units_collected: usize,
}

impl CollectionStats {
    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 被过滤器拒绝的节点总数
    pub fn total_ineligible(&self) -> usize {
        self.hidden + self.excluded_tag + self.too_short + self.detached
    }

    /// 产出率
    pub fn yield_rate(&self) -> f32 {
        if self.text_nodes_seen == 0 {
            0.0
        } else {
            self.units_collected as f32 / self.text_nodes_seen as f32
        }
    }

    fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Hidden => self.hidden += 1,
            Rejection::ExcludedTag => self.excluded_tag += 1,
            Rejection::TooShort => self.too_short += 1,
            Rejection::NoParent | Rejection::NotText => self.detached += 1,
        }
    }
}

/// 文本单元的惰性序列
///
/// 每次调用 [`TextCollector::units`] 都从头遍历，不能在中途重新开始。
pub struct TextUnits<'a> {
    walker: TextNodeWalker,
    filter: &'a VisibilityFilter,
    processed: &'a ProcessedSet,
    stats: &'a mut CollectionStats,
    next_id: usize,
}

impl Iterator for TextUnits<'_> {
    type Item = TextUnit;

    fn next(&mut self) -> Option<TextUnit> {
        for node in self.walker.by_ref() {
            self.stats.text_nodes_seen += 1;

            if self.processed.contains(&node) {
                self.stats.already_done += 1;
                continue;
            }

            if let Err(rejection) = self.filter.check(&node) {
                self.stats.record_rejection(rejection);
                continue;
            }

            let text = match &node.data {
                NodeData::Text { contents } => contents.borrow().trim().to_string(),
                _ => continue,
            };

            if text.is_empty() {
                self.stats.empty_after_trim += 1;
                continue;
            }

            self.next_id += 1;
            self.stats.units_collected += 1;
            return Some(TextUnit::new(self.next_id, text, &node));
        }

        None
    }
}

/// 文本收集器
#[derive(Debug, Default)]
pub struct TextCollector {
    filter: VisibilityFilter,
    processed: ProcessedSet,
    stats: CollectionStats,
}

impl TextCollector {
    pub fn new(filter: VisibilityFilter) -> Self {
        Self {
            filter,
            processed: ProcessedSet::new(),
            stats: CollectionStats::default(),
        }
    }

    /// 惰性产出 `root` 子树中的文本单元，序号从 1 开始
    pub fn units(&mut self, root: &Handle) -> TextUnits<'_> {
        TextUnits {
            walker: TextNodeWalker::new(root),
            filter: &self.filter,
            processed: &self.processed,
            stats: &mut self.stats,
            next_id: 0,
        }
    }

    /// 收集 `root` 子树中所有可翻译的文本单元
    ///
    /// 统计信息只反映本次收集。
    pub fn collect_units(&mut self, root: &Handle) -> Vec<TextUnit> {
        self.stats.reset();
        let pruned = self.processed.prune();
        if pruned > 0 {
            tracing::debug!("清理了 {} 个已销毁节点的处理标记", pruned);
        }

        let units: Vec<TextUnit> = self.units(root).collect();
        tracing::debug!("收集到 {} 个文本单元", units.len());
        units
    }

    /// 标记节点已处理
    pub fn mark_done(&mut self, node: &Handle) -> bool {
        self.processed.mark(node)
    }

    pub fn is_done(&self, node: &Handle) -> bool {
        self.processed.contains(node)
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    pub fn processed_mut(&mut self) -> &mut ProcessedSet {
        &mut self.processed
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// 重置统计信息
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
