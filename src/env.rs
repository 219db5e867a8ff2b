//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，配置管理器通过它应用覆盖值

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "PAGE_TRANSLATOR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "PAGE_TRANSLATOR_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "API key for the translation endpoint";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => OpenAiApiKey::get(),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 兼容的 OpenAI 密钥变量
    pub struct OpenAiApiKey;
    impl EnvVar<String> for OpenAiApiKey {
        const NAME: &'static str = "OPENAI_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Fallback API key variable";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "PAGE_TRANSLATOR_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Translation endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let value = value.trim();
            url::Url::parse(value).map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid URL '{}': {}", value, e),
            })?;
            Ok(value.to_string())
        }
    }

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "PAGE_TRANSLATOR_TARGET_LANG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Target language label, e.g. English or French";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 模型标识
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "PAGE_TRANSLATOR_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model identifier sent with every request";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 自动翻译开关
    pub struct AutoTranslate;
    impl EnvVar<bool> for AutoTranslate {
        const NAME: &'static str = "PAGE_TRANSLATOR_AUTO_TRANSLATE";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Translate automatically on load and on DOM mutations";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 批次大小
    pub struct ChunkSize;
    impl EnvVar<usize> for ChunkSize {
        const NAME: &'static str = "PAGE_TRANSLATOR_CHUNK_SIZE";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Maximum number of text units per request";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, crate::translation::constants::MAX_CHUNK_SIZE)
        }
    }

    /// 防抖间隔（毫秒）
    pub struct DebounceMs;
    impl EnvVar<u64> for DebounceMs {
        const NAME: &'static str = "PAGE_TRANSLATOR_DEBOUNCE_MS";
        const DEFAULT: Option<u64> = None;
        const DESCRIPTION: &'static str = "Quiet period after the last DOM mutation";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_usize(value, Self::NAME, 1, 60_000).map(|v| v as u64)
        }
    }
}

fn parse_non_empty(value: &str, var_name: &str) -> EnvResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 生成环境变量文档
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let entries: &[(&str, &str)] = &[
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION),
        (translation::OpenAiApiKey::NAME, translation::OpenAiApiKey::DESCRIPTION),
        (translation::ApiUrl::NAME, translation::ApiUrl::DESCRIPTION),
        (translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION),
        (translation::Model::NAME, translation::Model::DESCRIPTION),
        (translation::AutoTranslate::NAME, translation::AutoTranslate::DESCRIPTION),
        (translation::ChunkSize::NAME, translation::ChunkSize::DESCRIPTION),
        (translation::DebounceMs::NAME, translation::DebounceMs::DESCRIPTION),
    ];

    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("YES", "X").unwrap(), true);
        assert_eq!(parse_bool("off", "X").unwrap(), false);
        assert!(parse_bool("maybe", "X").is_err());
    }

    #[test]
    fn test_parse_positive_usize_bounds() {
        assert_eq!(parse_positive_usize(" 60 ", "X", 1, 1000).unwrap(), 60);
        assert!(parse_positive_usize("0", "X", 1, 1000).is_err());
        assert!(parse_positive_usize("1001", "X", 1, 1000).is_err());
        assert!(parse_positive_usize("abc", "X", 1, 1000).is_err());
    }

    #[test]
    fn test_variable_parsers() {
        assert_eq!(
            translation::ChunkSize::parse("20").unwrap(),
            20
        );
        assert_eq!(translation::DebounceMs::parse("350").unwrap(), 350);
        assert!(translation::ApiUrl::parse("not a url").is_err());
        assert!(translation::Model::parse("   ").is_err());
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(core::LogLevel::parse("loud").is_err());
    }

    #[test]
    fn test_env_docs_list_every_variable() {
        let docs = generate_env_docs();
        assert!(docs.contains("PAGE_TRANSLATOR_API_KEY"));
        assert!(docs.contains("PAGE_TRANSLATOR_DEBOUNCE_MS"));
        assert!(docs.contains("OPENAI_API_KEY"));
    }
}
