//! 翻译端点抽象
//!
//! 端点被视为黑盒：接收结构化请求，返回受 schema 约束的 JSON 文本。
//! 生产环境使用 [`OpenAiOracle`]，测试使用确定性的 [`MockOracle`]。

use async_trait::async_trait;

use crate::translation::error::TranslationResult;

pub mod mock;
pub mod openai;
pub mod protocol;

pub use mock::{MockMode, MockOracle, RecordedCall};
pub use openai::OpenAiOracle;
pub use protocol::{
    BatchTranslations, ResponsesRequest, ResponsesResponse, SourceString, TranslationEntry,
};

/// 翻译端点
#[async_trait]
pub trait TranslationOracle: Send + Sync {
    /// 提供者名称，用于日志
    fn provider_name(&self) -> &str;

    /// 发送请求并返回结构化输出文本
    ///
    /// 非成功状态返回 `TransportError`，响应体无法解析返回 `SchemaError`，
    /// 请求未得到响应返回 `NetworkError`。不做重试。
    async fn complete(&self, api_key: &str, request: &ResponsesRequest) -> TranslationResult<String>;
}
