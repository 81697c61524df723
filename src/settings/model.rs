use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[oai(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    Openai,
    Gemini,
    Anthropic,
}

impl ApiProvider {
    /// Models offered for every category (extraction, solution, debugging).
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            ApiProvider::Openai => &["gpt-4o", "gpt-4o-mini"],
            ApiProvider::Gemini => &["gemini-1.5-pro", "gemini-2.0-flash"],
            ApiProvider::Anthropic => &[
                "claude-3-7-sonnet-20250219",
                "claude-3-5-sonnet-20241022",
                "claude-3-opus-20240229",
            ],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }
}

/// Language solutions are written in
#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[oai(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    Golang,
    Cpp,
    Swift,
    Kotlin,
    Ruby,
    Sql,
    R,
}

/// Full settings as stored, API key in clear.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSettings {
    pub api_key: Option<String>,
    pub api_provider: ApiProvider,
    pub extraction_model: String,
    pub solution_model: String,
    pub debugging_model: String,
    pub language: Language,
    pub opacity: f64,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let provider = ApiProvider::Openai;
        StoredSettings {
            api_key: None,
            api_provider: provider,
            extraction_model: provider.default_model().to_string(),
            solution_model: provider.default_model().to_string(),
            debugging_model: provider.default_model().to_string(),
            language: Language::Python,
            opacity: 1.0,
        }
    }
}

/// Application settings
#[derive(Debug, Object, Clone, PartialEq, Serialize)]
#[oai(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// masked API key, e.g. `sk-a****wxyz`
    pub api_key: Option<String>,
    pub has_api_key: bool,
    pub api_provider: ApiProvider,
    /// model that extracts the problem from screenshots
    pub extraction_model: String,
    /// model that writes the solution
    pub solution_model: String,
    /// model that debugs a solution
    pub debugging_model: String,
    pub language: Language,
    /// window opacity between 0.1 and 1.0
    pub opacity: f64,
}

pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

impl From<&StoredSettings> for AppSettings {
    fn from(settings: &StoredSettings) -> Self {
        AppSettings {
            api_key: settings.api_key.as_deref().map(mask_api_key),
            has_api_key: settings.api_key.is_some(),
            api_provider: settings.api_provider,
            extraction_model: settings.extraction_model.clone(),
            solution_model: settings.solution_model.clone(),
            debugging_model: settings.debugging_model.clone(),
            language: settings.language,
            opacity: settings.opacity,
        }
    }
}

/// Update settings schema, only the given fields change
#[derive(Debug, Object, Clone, Default, PartialEq)]
#[oai(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// new API key, an empty string removes it
    pub api_key: Option<String>,
    /// switching provider resets models that are not given in the same update
    pub api_provider: Option<ApiProvider>,
    pub extraction_model: Option<String>,
    pub solution_model: Option<String>,
    pub debugging_model: Option<String>,
    pub language: Option<Language>,
    pub opacity: Option<f64>,
}
