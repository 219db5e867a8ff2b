//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// 配置错误（例如缺少 API 密钥），在任何网络请求之前中止
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 翻译端点返回了非成功状态
    #[error("翻译端点返回错误 {status}: {body}")]
    TransportError { status: u16, body: String },

    /// 响应无法解析为约定的结构
    #[error("响应结构错误: {0}")]
    SchemaError(String),

    /// 消息无法送达页面上下文
    #[error("消息投递失败: {0}")]
    DeliveryError(String),

    /// 网络错误（请求未得到任何响应）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可在后续周期中重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TransportError { status, .. } => {
                *status == 429 || *status >= 500
            }
            TranslationError::SchemaError(_) => true,
            TranslationError::DeliveryError(_) => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::TransportError { status, .. } if *status == 429 => {
                ErrorSeverity::Warning
            }
            TranslationError::TransportError { .. } => ErrorSeverity::Error,
            TranslationError::SchemaError(_) => ErrorSeverity::Error,
            TranslationError::DeliveryError(_) => ErrorSeverity::Warning,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 创建带上下文的错误
    ///
    /// `TransportError` 保留原始状态码，上下文附加到响应体之后。
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::SchemaError(msg)
            | TranslationError::DeliveryError(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::InternalError(msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::TransportError { body, .. } => {
                *body = format!("{} (上下文: {})", body, context);
            }
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::InternalError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SchemaError(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => TranslationError::TransportError {
                status: status.as_u16(),
                body: error.to_string(),
            },
            None => TranslationError::NetworkError(error.to_string()),
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }

    /// 获取错误率
    pub fn error_rate(&self, total_operations: usize) -> f64 {
        if total_operations == 0 {
            0.0
        } else {
            self.total_errors as f64 / total_operations as f64
        }
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建结构错误
    pub fn schema_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::SchemaError(msg.to_string())
    }

    /// 创建投递错误
    pub fn delivery_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::DeliveryError(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}
