//! 翻译服务核心实现
//!
//! 一个翻译周期：读取设置 → 页面语言检查 → 收集文本单元 → 划分批次 →
//! 逐批翻译并写回。批次严格按收集顺序串行处理，第 k+1 批在第 k 批结束后才开始。
//!
//! 同一时刻最多只有一个周期在运行。[`CycleGuard`] 在周期开始时获取，
//! 在任何退出路径（成功、错误、提前返回）上都会在析构时释放。
//!
//! 服务持有 `Rc`/`RefCell`，只能在单线程上下文（例如 `LocalSet`）中使用。
//! 收集器的借用从不跨越 `await`。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::find_body;
use crate::parsers::html::metadata::{get_page_lang, page_lang_matches};
use crate::translation::config::{SettingsProvider, TranslationConfig};
use crate::translation::error::{helpers::log_error, TranslationResult};
use crate::translation::notify::{Notice, Notifier, TracingNotifier};
use crate::translation::oracle::TranslationOracle;
use crate::translation::pipeline::{BatchManager, TextCollector, VisibilityFilter};

use super::engine::TranslationEngine;
use super::reconciler::{ApplyReport, DomWriter};

/// 周期的触发来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleTrigger {
    /// 页面加载后的首次周期
    InitialLoad,
    /// 防抖后的 DOM 变更
    Mutation,
    /// "立即翻译"命令
    ApplyNow,
    /// 打开自动翻译
    Toggle,
}

impl fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleTrigger::InitialLoad => "initial-load",
            CycleTrigger::Mutation => "mutation",
            CycleTrigger::ApplyNow => "apply-now",
            CycleTrigger::Toggle => "toggle",
        };
        f.write_str(label)
    }
}

/// 周期结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 所有批次均已写回
    Completed,
    /// 没有需要翻译的文本
    NothingToTranslate,
    /// 页面语言已是目标语言
    SkippedPageLang(String),
    /// 已有周期在运行，本次触发被忽略
    Busy,
}

/// 周期报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub trigger: CycleTrigger,
    pub outcome: CycleOutcome,
    pub units_collected: usize,
    pub batches_total: usize,
    pub batches_completed: usize,
    pub changed: usize,
    pub detached: usize,
}

impl CycleReport {
    fn new(trigger: CycleTrigger, outcome: CycleOutcome) -> Self {
        Self {
            trigger,
            outcome,
            units_collected: 0,
            batches_total: 0,
            batches_completed: 0,
            changed: 0,
            detached: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.outcome == CycleOutcome::Busy
    }
}

/// 单飞标志的持有凭证，析构时释放
#[derive(Debug)]
pub struct CycleGuard {
    flag: Rc<Cell<bool>>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// 翻译服务
pub struct TranslationService {
    settings: Arc<dyn SettingsProvider>,
    engine: TranslationEngine,
    collector: RefCell<TextCollector>,
    batcher: BatchManager,
    writer: DomWriter,
    notifier: Arc<dyn Notifier>,
    respect_page_lang: bool,
    stats: ServiceStats,
    in_flight: Rc<Cell<bool>>,
}

impl TranslationService {
    /// 创建翻译服务
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        oracle: Arc<dyn TranslationOracle>,
        config: &TranslationConfig,
    ) -> Self {
        let filter = VisibilityFilter::new(config.skip_elements.iter(), config.min_text_length);

        Self {
            settings,
            engine: TranslationEngine::new(oracle),
            collector: RefCell::new(TextCollector::new(filter)),
            batcher: BatchManager::new(config.chunk_size),
            writer: DomWriter::default(),
            notifier: Arc::new(TracingNotifier),
            respect_page_lang: config.respect_page_lang,
            stats: ServiceStats::default(),
            in_flight: Rc::new(Cell::new(false)),
        }
    }

    /// 替换通知接收端
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// 替换写回器
    pub fn with_writer(mut self, writer: DomWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn settings_provider(&self) -> &Arc<dyn SettingsProvider> {
        &self.settings
    }

    /// 是否有周期正在运行
    pub fn is_cycling(&self) -> bool {
        self.in_flight.get()
    }

    /// 尝试获取单飞标志，已有周期运行时返回 `None`
    pub fn begin_cycle(&self) -> Option<CycleGuard> {
        if self.in_flight.replace(true) {
            return None;
        }
        Some(CycleGuard {
            flag: Rc::clone(&self.in_flight),
        })
    }

    /// 运行一个周期，已有周期运行时直接返回 [`CycleOutcome::Busy`]
    pub async fn run_cycle(
        &self,
        document: &Handle,
        trigger: CycleTrigger,
    ) -> TranslationResult<CycleReport> {
        match self.begin_cycle() {
            Some(guard) => self.run_cycle_with_guard(guard, document, trigger).await,
            None => {
                tracing::debug!("已有翻译周期在运行，忽略 {} 触发", trigger);
                Ok(CycleReport::new(trigger, CycleOutcome::Busy))
            }
        }
    }

    /// 使用已获取的单飞标志运行一个周期
    pub async fn run_cycle_with_guard(
        &self,
        guard: CycleGuard,
        document: &Handle,
        trigger: CycleTrigger,
    ) -> TranslationResult<CycleReport> {
        let _guard = guard;
        let start_time = Instant::now();
        self.stats.cycles_started.fetch_add(1, Ordering::Relaxed);

        let result = self.cycle(document, trigger).await;

        self.stats.add_processing_time(start_time.elapsed());
        match &result {
            Ok(report) => {
                match report.outcome {
                    CycleOutcome::SkippedPageLang(_) => {
                        self.stats.cycles_skipped.fetch_add(1, Ordering::Relaxed)
                    }
                    _ => self.stats.cycles_completed.fetch_add(1, Ordering::Relaxed),
                };
            }
            Err(e) => {
                self.stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                log_error(e);
                self.notifier.notify(Notice::error(format!("翻译失败: {}", e)));
            }
        }

        result
    }

    async fn cycle(&self, document: &Handle, trigger: CycleTrigger) -> TranslationResult<CycleReport> {
        let settings = self.settings.get_settings()?;

        if self.respect_page_lang {
            if let Some(page_lang) = get_page_lang(document) {
                if page_lang_matches(&page_lang, &settings.target_lang) {
                    tracing::info!(
                        "页面语言 '{}' 已是目标语言 {}，跳过翻译",
                        page_lang,
                        settings.target_lang
                    );
                    return Ok(CycleReport::new(trigger, CycleOutcome::SkippedPageLang(page_lang)));
                }
            }
        }

        let root = find_body(document).unwrap_or_else(|| document.clone());
        let units = self.collector.borrow_mut().collect_units(&root);

        let mut report = CycleReport::new(trigger, CycleOutcome::Completed);
        report.units_collected = units.len();
        self.stats.units_collected.fetch_add(units.len(), Ordering::Relaxed);

        if units.is_empty() {
            tracing::debug!("{} 周期: 没有需要翻译的文本", trigger);
            report.outcome = CycleOutcome::NothingToTranslate;
            return Ok(report);
        }

        let batches = self.batcher.create_batches(units);
        report.batches_total = batches.len();
        tracing::info!(
            "{} 周期: {} 个文本单元, {} 个批次",
            trigger,
            report.units_collected,
            report.batches_total
        );

        let mut applied = ApplyReport::default();
        for batch in &batches {
            let resolved = self.engine.translate_batch(&settings, batch).await.map_err(|e| {
                tracing::warn!(
                    "批次 {}/{} 失败，已完成的 {} 个批次保留",
                    batch.index + 1,
                    report.batches_total,
                    report.batches_completed
                );
                e
            })?;

            let batch_report =
                self.writer
                    .apply_batch(&mut self.collector.borrow_mut(), batch, &resolved)?;
            self.stats.units_changed.fetch_add(batch_report.changed, Ordering::Relaxed);
            applied.merge(batch_report);
            report.batches_completed += 1;
        }

        report.changed = applied.changed;
        report.detached = applied.detached;

        tracing::info!(
            "{} 周期完成: 改写 {} 个节点, {} 个节点已脱离",
            trigger,
            report.changed,
            report.detached
        );
        self.notifier
            .notify(Notice::success(format!("已翻译 {} 处文本", report.changed)));

        Ok(report)
    }

    /// 忘记所有已处理标记（例如页面导航后）
    pub fn reset_processed(&self) {
        self.collector.borrow_mut().processed_mut().clear();
    }

    /// 节点是否已被标记为处理过
    pub fn is_done(&self, node: &Handle) -> bool {
        self.collector.borrow().is_done(node)
    }

    /// 获取服务统计
    pub fn get_stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// 获取引擎
    pub fn engine(&self) -> &TranslationEngine {
        &self.engine
    }

    /// 最近一次收集的统计
    pub fn collection_stats(&self) -> crate::translation::pipeline::CollectionStats {
        self.collector.borrow().get_stats().clone()
    }
}

/// 服务统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub cycles_started: AtomicUsize,
    pub cycles_completed: AtomicUsize,
    pub cycles_failed: AtomicUsize,
    pub cycles_skipped: AtomicUsize,
    pub units_collected: AtomicUsize,
    pub units_changed: AtomicUsize,
    /// 总处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            units_collected: self.units_collected.load(Ordering::Relaxed),
            units_changed: self.units_changed.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }

    /// 重置所有统计计数器
    pub fn reset(&self) {
        self.cycles_started.store(0, Ordering::Relaxed);
        self.cycles_completed.store(0, Ordering::Relaxed);
        self.cycles_failed.store(0, Ordering::Relaxed);
        self.cycles_skipped.store(0, Ordering::Relaxed);
        self.units_collected.store(0, Ordering::Relaxed);
        self.units_changed.store(0, Ordering::Relaxed);
        self.processing_time.store(0, Ordering::Relaxed);
    }
}

/// 服务统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub cycles_started: usize,
    pub cycles_completed: usize,
    pub cycles_failed: usize,
    pub cycles_skipped: usize,
    pub units_collected: usize,
    pub units_changed: usize,
    pub processing_time: Duration,
}
