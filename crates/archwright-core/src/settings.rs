use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Model provider configuration plus the knowledge-base root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_dir: Option<PathBuf>,
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            knowledge_base_dir: None,
        }
    }
}

impl Settings {
    /// Layer `ARCHWRIGHT_PROVIDER`, `ARCHWRIGHT_MODEL` and `ARCHWRIGHT_API_KEY`
    /// on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(v) = non_empty("ARCHWRIGHT_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = non_empty("ARCHWRIGHT_MODEL") {
            self.model = v;
        }
        if let Some(v) = non_empty("ARCHWRIGHT_API_KEY") {
            self.api_key = v;
        }
    }
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join("settings.json")
}

/// Missing or unreadable settings fall back to defaults.
pub fn read_settings(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    match std::fs::read_to_string(path)
        .ok()
        .map(|s| serde_json::from_str::<Settings>(&s))
    {
        Some(Ok(settings)) => settings,
        Some(Err(e)) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed settings");
            Settings::default()
        }
        None => Settings::default(),
    }
}

pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json).map_err(io)
}

pub fn ai_configured(settings: &Settings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn settings(provider: &str, model: &str, key: &str) -> Settings {
        Settings {
            provider: provider.into(),
            model: model.into(),
            api_key: key.into(),
            ..Settings::default()
        }
    }

    #[rstest]
    #[case(settings("openai", "gpt-4o", "sk"), true)]
    #[case(settings("openai", "gpt-4o", ""), false)]
    #[case(settings("ollama", "llama3", ""), true)]
    #[case(settings("", "gpt-4o", "sk"), false)]
    #[case(settings("google", "", "k"), false)]
    fn configured_requires_provider_model_and_key(#[case] s: Settings, #[case] expected: bool) {
        assert_eq!(ai_configured(&s), expected);
    }

    #[test]
    fn overrides_replace_only_non_empty_values() {
        let vars: HashMap<&str, &str> = [("ARCHWRIGHT_MODEL", "gemini-1.5"), ("ARCHWRIGHT_API_KEY", "")]
            .into_iter()
            .collect();
        let mut s = settings("google", "old", "key");
        s.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(s.model, "gemini-1.5");
        assert_eq!(s.api_key, "key");
        assert_eq!(s.provider, "google");
    }

    #[test]
    fn missing_or_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(dir.path());
        assert_eq!(read_settings(&path), Settings::default());

        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_settings(&path), Settings::default());
    }

    #[test]
    fn write_then_read_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir.path().join("nested"));
        let s = settings("anthropic", "claude", "k");
        write_settings(&path, &s).unwrap();
        let back = read_settings(&path);
        assert_eq!(back, s);
        assert_eq!(back.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
    }
}
