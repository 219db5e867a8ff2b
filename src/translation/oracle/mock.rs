//! 用于测试的确定性翻译端点
//!
//! 不需要网络或 API 密钥。每次调用都会记录下来，便于断言请求内容与调用时间。
//!
//! ```ignore
//! use page_translator::translation::oracle::{MockMode, MockOracle};
//!
//! let oracle = MockOracle::new(MockMode::Suffix(" [fr]".to_string()));
//! oracle.push_reply(MockMode::Error(TranslationError::TransportError {
//!     status: 429,
//!     body: "slow down".to_string(),
//! }));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::protocol::{BatchTranslations, ResponsesRequest, SourceString, TranslationEntry};
use super::TranslationOracle;
use crate::translation::error::{TranslationError, TranslationResult};

/// 模拟的端点行为
#[derive(Debug, Clone)]
pub enum MockMode {
    /// 按源文本查表，表中没有的字符串从响应中省略
    Mappings(HashMap<String, String>),

    /// 在每条源文本后追加后缀
    Suffix(String),

    /// 原样返回给定的输出文本（用于构造畸形响应）
    Raw(String),

    /// 返回错误
    Error(TranslationError),
}

impl MockMode {
    /// 由 `(源文本, 译文)` 对构造查表模式
    pub fn mappings<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MockMode::Mappings(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// 调用开始的时刻（tokio 时钟，暂停时间的测试中同样可靠）
    pub at: tokio::time::Instant,
    pub api_key: String,
    pub request: ResponsesRequest,
    pub strings: Vec<SourceString>,
}

/// 模拟翻译端点
#[derive(Debug)]
pub struct MockOracle {
    mode: MockMode,
    delay: Duration,
    script: Mutex<VecDeque<MockMode>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockOracle {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// 每次调用前模拟网络延迟
    pub fn with_delay(mode: MockMode, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(mode)
        }
    }

    /// 为下一次调用指定行为，按入队顺序消费，用完后回到默认模式
    pub fn push_reply(&self, mode: MockMode) {
        lock(&self.script).push_back(mode);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// 所有已记录调用的副本
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        lock(&self.calls).last().cloned()
    }

    fn render(mode: &MockMode, strings: &[SourceString]) -> TranslationResult<String> {
        let translations = match mode {
            MockMode::Mappings(map) => strings
                .iter()
                .filter_map(|s| map.get(&s.text).map(|t| TranslationEntry::new(s.id.clone(), t.clone())))
                .collect(),
            MockMode::Suffix(suffix) => strings
                .iter()
                .map(|s| TranslationEntry::new(s.id.clone(), format!("{}{}", s.text, suffix)))
                .collect(),
            MockMode::Raw(text) => return Ok(text.clone()),
            MockMode::Error(error) => return Err(error.clone()),
        };

        serde_json::to_string(&BatchTranslations { translations })
            .map_err(|e| TranslationError::InternalError(e.to_string()))
    }
}

#[async_trait]
impl TranslationOracle for MockOracle {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, api_key: &str, request: &ResponsesRequest) -> TranslationResult<String> {
        let strings = request.source_strings()?;
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(RecordedCall {
            at: tokio::time::Instant::now(),
            api_key: api_key.to_string(),
            request: request.clone(),
            strings: strings.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = lock(&self.script).pop_front();
        Self::render(scripted.as_ref().unwrap_or(&self.mode), &strings)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
