// Application settings
// Loaded from ~/.config/gridassist/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// AI features disabled (default)
    #[default]
    None,
    /// Google Gemini API
    Gemini,
}

impl AIProvider {
    /// Returns true if AI features are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::Gemini => "gemini",
        }
    }

    /// Ordered fallback list used when the settings name no models
    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            AIProvider::None => &[],
            AIProvider::Gemini => &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"],
        }
    }

    pub fn needs_api_key(&self) -> bool {
        self.is_enabled()
    }
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// AI-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Ordered fallback list (empty = provider defaults)
    pub models: Vec<String>,

    /// Model tried first (None = first of `models`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_model: Option<String>,

    /// Sampling temperature for extraction and chat
    pub temperature: f32,

    /// Sampling temperature for web-search quoting
    pub search_temperature: f32,

    /// Per-attempt HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Base URL override (proxies, self-hosted gateways)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            models: Vec::new(),
            start_model: None,
            temperature: 0.2,
            search_temperature: 0.0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            endpoint: None,
        }
    }
}

impl AISettings {
    /// Get the effective model list (user-specified or provider default)
    pub fn effective_models(&self) -> Vec<String> {
        let models: Vec<String> = self
            .models
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            self.provider.default_models().iter().map(|m| m.to_string()).collect()
        } else {
            models
        }
    }

    /// Get the effective start model. An explicit start model need not be in
    /// the list; fallback then begins at the top of the list.
    pub fn effective_start_model(&self) -> String {
        match self.start_model.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.effective_models().into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Write `<output>.provenance.json` next to every grid the CLI writes
    #[serde(rename = "export.provenanceSidecar")]
    pub provenance_sidecar: bool,

    // AI
    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provenance_sidecar: false,
            ai: AISettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridassist");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load from an explicit path. Errors are logged and yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring whole-line `//` comments
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("error creating config directory: {}", e);
                return;
            }
        }

        if let Err(e) = fs::write(path, DEFAULT_CONFIG) {
            log::warn!("error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Export: write a provenance sidecar next to written grids
    "export.provenanceSidecar": false,

    // AI (disabled by default)
    // Provider options: "none", "gemini"
    // API keys are stored in system keychain or GRIDASSIST_GEMINI_KEY, not in this file
    "ai": {
        "provider": "none",
        // Ordered fallback list; empty = provider defaults
        "models": [],
        "temperature": 0.2,
        "search_temperature": 0.0,
        // Per-attempt timeout; a timed-out attempt falls back to the next model
        "timeout_secs": 120
    }
}
"#;
