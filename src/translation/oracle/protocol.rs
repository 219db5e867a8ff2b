//! 翻译端点协议
//!
//! 请求体包含模型标识、`system` 指令与 `user` 负载两条角色消息，
//! 以及把输出约束为 `{translations: [{id, translated}]}` 的 `response_format`。
//! 响应体的 `output` 字段中嵌套着符合该结构的 JSON 文本。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 发送给端点的一条源文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceString {
    pub id: String,
    pub text: String,
}

impl SourceString {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// `user` 消息的负载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub strings: Vec<SourceString>,
}

/// 角色消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

impl InputMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 结构化输出请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputMessage>,
    pub response_format: Value,
}

impl ResponsesRequest {
    /// 构造一个批次的翻译请求
    pub fn for_batch(
        model: &str,
        target_lang: &str,
        strings: Vec<SourceString>,
    ) -> TranslationResult<Self> {
        let payload = serde_json::to_string(&UserPayload { strings })
            .map_err(|e| TranslationError::InternalError(format!("序列化请求负载失败: {}", e)))?;

        Ok(Self {
            model: model.to_string(),
            input: vec![
                InputMessage::system(system_instruction(target_lang)),
                InputMessage::user(payload),
            ],
            response_format: response_format(),
        })
    }

    /// 解析 `user` 消息中的源文本列表
    pub fn source_strings(&self) -> TranslationResult<Vec<SourceString>> {
        let user = self
            .input
            .iter()
            .find(|message| message.role == "user")
            .ok_or_else(|| TranslationError::InvalidInput("请求中缺少 user 消息".to_string()))?;

        let payload: UserPayload = serde_json::from_str(&user.content)
            .map_err(|e| TranslationError::InvalidInput(format!("user 负载无效: {}", e)))?;
        Ok(payload.strings)
    }

    /// `system` 指令文本
    pub fn system_instruction(&self) -> Option<&str> {
        self.input
            .iter()
            .find(|message| message.role == "system")
            .map(|message| message.content.as_str())
    }
}

/// 系统指令
pub fn system_instruction(target_lang: &str) -> String {
    [
        "You are a professional translator.".to_string(),
        format!("Translate ALL provided strings into {}.", target_lang),
        "Preserve meaning, tone, and punctuation.".to_string(),
        "Do NOT translate code snippets, file extensions, URLs, brand/product names, or HTML tags."
            .to_string(),
        "Return ONLY valid JSON with shape: { \"translations\": [{\"id\": string, \"translated\": string}, ...] }."
            .to_string(),
    ]
    .join(" ")
}

/// `{translations: [{id, translated}]}` 的 JSON Schema
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "translations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "translated": { "type": "string" }
                    },
                    "required": ["id", "translated"]
                }
            }
        },
        "required": ["translations"]
    })
}

/// 结构化输出约束
pub fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": constants::RESPONSE_SCHEMA_NAME,
            "schema": response_schema()
        }
    })
}

/// 端点响应体（只保留需要的字段）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ResponsesResponse {
    /// 第一个携带文本的输出项中的第一段文本
    pub fn output_text(&self) -> Option<&str> {
        self.output
            .iter()
            .find_map(|item| item.content.iter().find_map(|c| c.text.as_deref()))
    }
}

/// 结构化输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTranslations {
    pub translations: Vec<TranslationEntry>,
}

/// 单条译文，`id` 可以是字符串或数字
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    #[serde(deserialize_with = "deserialize_wire_id")]
    pub id: String,
    pub translated: String,
}

impl TranslationEntry {
    pub fn new(id: impl Into<String>, translated: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            translated: translated.into(),
        }
    }
}

fn deserialize_wire_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match WireId::deserialize(deserializer)? {
        WireId::Text(id) => id,
        WireId::Number(id) => id.to_string(),
    })
}
