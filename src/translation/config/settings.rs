//! 周期设置
//!
//! 每个翻译周期开始时读取一次的设置快照，以及提供设置的外部协作者接口

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 一个周期使用的设置快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 空字符串表示尚未配置凭据
    pub api_key: String,
    pub target_lang: String,
    pub model: String,
    pub auto_translate: bool,
}

impl Settings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_target_lang(mut self, target_lang: impl Into<String>) -> Self {
        self.target_lang = target_lang.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_auto_translate(mut self, auto_translate: bool) -> Self {
        self.auto_translate = auto_translate;
        self
    }

    /// 是否存在可用的凭据
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// 应用部分更新
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(target_lang) = &update.target_lang {
            self.target_lang = target_lang.clone();
        }
        if let Some(model) = &update.model {
            self.model = model.clone();
        }
        if let Some(auto_translate) = update.auto_translate {
            self.auto_translate = auto_translate;
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            model: constants::DEFAULT_MODEL.to_string(),
            auto_translate: constants::DEFAULT_AUTO_TRANSLATE,
        }
    }
}

/// "设置"命令携带的部分更新，未给出的字段保持不变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub auto_translate: Option<bool>,
}

impl SettingsUpdate {
    pub fn validate(&self) -> TranslationResult<()> {
        if matches!(&self.target_lang, Some(lang) if lang.trim().is_empty()) {
            return Err(TranslationError::InvalidInput("目标语言不能为空".to_string()));
        }
        if matches!(&self.model, Some(model) if model.trim().is_empty()) {
            return Err(TranslationError::InvalidInput("模型标识不能为空".to_string()));
        }
        Ok(())
    }
}

/// 设置提供者
///
/// 核心只在周期开始时调用一次 `get_settings`，周期内不会再次读取。
pub trait SettingsProvider: Send + Sync {
    fn get_settings(&self) -> TranslationResult<Settings>;
}

/// 固定在内存中的设置，可在运行时修改
#[derive(Debug, Default)]
pub struct StaticSettings {
    inner: RwLock<Settings>,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn set_api_key(&self, api_key: impl Into<String>) -> TranslationResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| TranslationError::InternalError("设置锁已损坏".to_string()))?;
        guard.api_key = api_key.into();
        Ok(())
    }

    pub fn update(&self, update: &SettingsUpdate) -> TranslationResult<Settings> {
        update.validate()?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| TranslationError::InternalError("设置锁已损坏".to_string()))?;
        guard.apply(update);
        Ok(guard.clone())
    }
}

impl SettingsProvider for StaticSettings {
    fn get_settings(&self) -> TranslationResult<Settings> {
        self.inner
            .read()
            .map(|settings| settings.clone())
            .map_err(|_| TranslationError::InternalError("设置锁已损坏".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.target_lang, "English");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert!(settings.auto_translate);
        assert!(!settings.has_credential());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let provider = StaticSettings::new(Settings::new("sk-test").with_target_lang("French"));
        let updated = provider
            .update(&SettingsUpdate {
                auto_translate: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.target_lang, "French");
        assert_eq!(updated.api_key, "sk-test");
        assert!(!updated.auto_translate);
    }

    #[test]
    fn test_blank_update_rejected() {
        let provider = StaticSettings::default();
        let result = provider.update(&SettingsUpdate {
            model: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(TranslationError::InvalidInput(_))));
        assert_eq!(provider.get_settings().unwrap().model, "gpt-4o-mini");
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let json = serde_json::to_value(Settings::new("k")).unwrap();
        assert_eq!(json["apiKey"], "k");
        assert_eq!(json["targetLang"], "English");
        assert_eq!(json["autoTranslate"], true);
    }
}
