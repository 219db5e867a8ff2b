//! 翻译引擎核心实现
//!
//! 负责一个批次与翻译端点之间的往返：
//!
//! 1. 检查凭据，缺失时在任何网络请求之前失败
//! 2. 将批次序列化为请求（id 以字符串发送）
//! 3. 解析受 schema 约束的输出
//! 4. 将输出对齐回批次：每个发送的 id 恰好得到一条结果，端点遗漏的 id 回退为源文本，
//!    多余的 id 被丢弃
//!
//! 引擎不修改 DOM，写回由 [`super::reconciler::DomWriter`] 完成。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::translation::config::Settings;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::oracle::{
    BatchTranslations, ResponsesRequest, SourceString, TranslationEntry, TranslationOracle,
};
use crate::translation::pipeline::{Batch, TextUnit};

/// 一个单元的最终译文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTranslation {
    pub local_id: usize,
    pub text: String,
    /// 端点遗漏了该 id，`text` 为源文本
    pub from_fallback: bool,
}

/// 对齐结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub entries: Vec<ResolvedTranslation>,
    pub fallbacks: usize,
    pub discarded: usize,
}

/// 解析端点输出文本
///
/// 输出偶尔被包裹在 Markdown 代码块中，解析前会去掉外层围栏。
pub fn parse_batch_translations(output: &str) -> TranslationResult<BatchTranslations> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();

    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(TranslationError::SchemaError(
            "端点没有返回结构化输出".to_string(),
        ));
    }

    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").ok());
    let body = fence
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    serde_json::from_str(body)
        .map_err(|e| TranslationError::SchemaError(format!("输出不符合预期结构: {}", e)))
}

/// 将端点结果与批次对齐
///
/// 返回与 `units` 等长、同序的结果。重复 id 以最后一条为准。
pub fn resolve_translations(units: &[TextUnit], translations: Vec<TranslationEntry>) -> Resolution {
    let mut by_id: HashMap<String, String> = translations
        .into_iter()
        .map(|entry| (entry.id, entry.translated))
        .collect();

    let mut resolution = Resolution {
        entries: Vec::with_capacity(units.len()),
        ..Default::default()
    };

    for unit in units {
        match by_id.remove(&unit.wire_id()) {
            Some(text) => resolution.entries.push(ResolvedTranslation {
                local_id: unit.local_id,
                text,
                from_fallback: false,
            }),
            None => {
                resolution.fallbacks += 1;
                resolution.entries.push(ResolvedTranslation {
                    local_id: unit.local_id,
                    text: unit.source_text.clone(),
                    from_fallback: true,
                });
            }
        }
    }

    resolution.discarded = by_id.len();
    resolution
}

/// 翻译引擎
pub struct TranslationEngine {
    oracle: Arc<dyn TranslationOracle>,
    stats: EngineStats,
}

impl TranslationEngine {
    pub fn new(oracle: Arc<dyn TranslationOracle>) -> Self {
        Self {
            oracle,
            stats: EngineStats::default(),
        }
    }

    pub fn oracle(&self) -> &Arc<dyn TranslationOracle> {
        &self.oracle
    }

    /// 翻译一个批次
    ///
    /// 成功时返回与批次等长、同序的结果。
    pub async fn translate_batch(
        &self,
        settings: &Settings,
        batch: &Batch,
    ) -> TranslationResult<Vec<ResolvedTranslation>> {
        if !settings.has_credential() {
            self.stats.inc_errors();
            return Err(TranslationError::ConfigError("缺少 API 密钥".to_string()));
        }

        let start_time = Instant::now();
        let strings: Vec<SourceString> = batch
            .units
            .iter()
            .map(|unit| SourceString::new(unit.wire_id(), unit.source_text.clone()))
            .collect();
        let request = ResponsesRequest::for_batch(&settings.model, &settings.target_lang, strings)?;

        tracing::debug!(
            "发送 {} 到 {} (模型 {}, 目标语言 {})",
            batch.summary(),
            self.oracle.provider_name(),
            settings.model,
            settings.target_lang
        );
        self.stats.add_items_sent(batch.len(), batch.total_chars());

        let output = match self.oracle.complete(&settings.api_key, &request).await {
            Ok(output) => output,
            Err(e) => {
                self.stats.inc_errors();
                return Err(e);
            }
        };

        let parsed = parse_batch_translations(&output).inspect_err(|_| self.stats.inc_errors())?;
        let resolution = resolve_translations(&batch.units, parsed.translations);

        if resolution.fallbacks > 0 {
            tracing::warn!(
                "批次#{}: 端点遗漏了 {} 个 id，使用源文本",
                batch.index,
                resolution.fallbacks
            );
        }
        if resolution.discarded > 0 {
            tracing::debug!(
                "批次#{}: 丢弃了 {} 个未请求的 id",
                batch.index,
                resolution.discarded
            );
        }

        self.stats.record_batch(&resolution, start_time.elapsed());
        Ok(resolution.entries)
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// 引擎统计
#[derive(Debug, Default)]
pub struct EngineStats {
    /// 成功完成的批次数
    pub batches_processed: AtomicUsize,
    /// 发送的单元数
    pub items_sent: AtomicUsize,
    /// 发送的字符数
    pub characters_sent: AtomicUsize,
    /// 回退为源文本的单元数
    pub fallbacks: AtomicUsize,
    /// 丢弃的多余 id 数
    pub extra_ids_discarded: AtomicUsize,
    /// 失败的批次数
    pub translation_errors: AtomicUsize,
    /// 总处理时间（微秒）
    pub total_processing_time: AtomicU64,
}

impl EngineStats {
    fn add_items_sent(&self, items: usize, characters: usize) {
        self.items_sent.fetch_add(items, Ordering::Relaxed);
        self.characters_sent.fetch_add(characters, Ordering::Relaxed);
    }

    fn inc_errors(&self) {
        self.translation_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch(&self, resolution: &Resolution, elapsed: Duration) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.fallbacks
            .fetch_add(resolution.fallbacks, Ordering::Relaxed);
        self.extra_ids_discarded
            .fetch_add(resolution.discarded, Ordering::Relaxed);
        self.total_processing_time
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            items_sent: self.items_sent.load(Ordering::Relaxed),
            characters_sent: self.characters_sent.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            extra_ids_discarded: self.extra_ids_discarded.load(Ordering::Relaxed),
            translation_errors: self.translation_errors.load(Ordering::Relaxed),
            total_processing_time: Duration::from_micros(
                self.total_processing_time.load(Ordering::Relaxed),
            ),
        }
    }
}

/// 引擎统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub batches_processed: usize,
    pub items_sent: usize,
    pub characters_sent: usize,
    pub fallbacks: usize,
    pub extra_ids_discarded: usize,
    pub translation_errors: usize,
    pub total_processing_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::html_to_dom;
    use crate::translation::oracle::{MockMode, MockOracle};
    use crate::translation::pipeline::TextCollector;
    use markup5ever_rcdom::RcDom;

    fn units_for(html: &str) -> (RcDom, Vec<TextUnit>) {
        let dom = html_to_dom(html.as_bytes(), "utf-8");
        let units = TextCollector::default().collect_units(&dom.document);
        (dom, units)
    }

    #[test]
    fn test_parse_plain_and_fenced_output() {
        let plain = r#"{"translations":[{"id":"1","translated":"Bonjour"}]}"#;
        assert_eq!(parse_batch_translations(plain).unwrap().translations.len(), 1);

        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(
            parse_batch_translations(&fenced).unwrap().translations[0].translated,
            "Bonjour"
        );
    }

    #[test]
    fn test_parse_failures_are_schema_errors() {
        for bad in ["", "   ", "not json", r#"{"items":[]}"#, r#"{"translations":[{"id":"1"}]}"#] {
            assert!(
                matches!(parse_batch_translations(bad), Err(TranslationError::SchemaError(_))),
                "input {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_resolve_fills_gaps_and_discards_extras() {
        let (_dom, units) = units_for("<p>One</p><p>Two</p><p>Three</p>");
        let resolution = resolve_translations(
            &units,
            vec![
                TranslationEntry::new("3", "Trois"),
                TranslationEntry::new("1", "Un"),
                TranslationEntry::new("99", "Extra"),
            ],
        );

        let texts: Vec<&str> = resolution.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["Un", "Two", "Trois"]);
        let ids: Vec<usize> = resolution.entries.iter().map(|e| e.local_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(resolution.entries[1].from_fallback);
        assert_eq!(resolution.fallbacks, 1);
        assert_eq!(resolution.discarded, 1);
    }

    #[test]
    fn test_resolve_duplicate_ids_last_wins() {
        let (_dom, units) = units_for("<p>One</p>");
        let resolution = resolve_translations(
            &units,
            vec![TranslationEntry::new("1", "first"), TranslationEntry::new("1", "second")],
        );
        assert_eq!(resolution.entries.len(), 1);
        assert_eq!(resolution.entries[0].text, "second");
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_call() {
        let oracle = Arc::new(MockOracle::new(MockMode::Suffix("!".to_string())));
        let engine = TranslationEngine::new(oracle.clone());
        let (_dom, units) = units_for("<p>Hello</p>");

        let result = engine
            .translate_batch(&Settings::new("  "), &Batch::new(0, units))
            .await;

        assert!(matches!(result, Err(TranslationError::ConfigError(_))));
        assert_eq!(oracle.call_count(), 0);
        assert_eq!(engine.get_stats().snapshot().translation_errors, 1);
    }

    #[tokio::test]
    async fn test_translate_batch_sends_string_ids() {
        let oracle = Arc::new(MockOracle::new(MockMode::mappings([("Hello", "Bonjour")])));
        let engine = TranslationEngine::new(oracle.clone());
        let (_dom, units) = units_for("<p>Hello</p><p>World</p>");

        let settings = Settings::new("sk-test").with_target_lang("French");
        let resolved = engine.translate_batch(&settings, &Batch::new(0, units)).await.unwrap();

        assert_eq!(resolved[0].text, "Bonjour");
        assert_eq!(resolved[1].text, "World");
        assert!(resolved[1].from_fallback);

        let call = oracle.last_call().unwrap();
        assert_eq!(call.api_key, "sk-test");
        assert_eq!(call.strings[1], SourceString::new("2", "World"));
        assert!(call.request.system_instruction().unwrap().contains("into French."));

        let stats = engine.get_stats().snapshot();
        assert_eq!(stats.batches_processed, 1);
        assert_eq!(stats.items_sent, 2);
        assert_eq!(stats.fallbacks, 1);
    }
}
