// AI configuration and secrets management
//
// API keys are stored securely using:
// 1. System keychain (preferred)
// 2. Environment variables (fallback for CI/headless)
//
// Keys are NEVER stored in settings.json

use std::env;

use serde::Serialize;

use crate::settings::{AIProvider, AISettings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "gridassist";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the environment variable name for a provider
pub fn env_var_name(provider: &str) -> String {
    format!("GRIDASSIST_{}_KEY", provider.to_uppercase())
}

/// Get the keychain account name for a provider
#[cfg_attr(not(feature = "keychain"), allow(dead_code))]
fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Get an API key for the specified provider
///
/// Checks in order:
/// 1. System keychain
/// 2. Environment variable (GRIDASSIST_GEMINI_KEY, etc.)
pub fn get_api_key(provider: &str) -> KeyLookup {
    // Try keychain first
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider)) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    // Fall back to environment variable
    let env_name = env_var_name(provider);
    if let Ok(key) = env::var(&env_name) {
        if !key.trim().is_empty() {
            return KeyLookup {
                key: Some(key.trim().to_string()),
                source: KeySource::Environment,
            };
        }
    }

    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// Store an API key in the system keychain
#[cfg(feature = "keychain")]
pub fn set_api_key(provider: &str, key: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(key)
        .map_err(|e| format!("Failed to store key in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(provider: &str, _key: &str) -> Result<(), String> {
    Err(format!(
        "Keychain support not enabled. Set {} environment variable instead.",
        env_var_name(provider)
    ))
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "availability-check").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved AI Configuration (single source of truth)
// ============================================================================

/// The effective AI configuration, fully resolved from all sources.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    pub provider: AIProvider,
    /// Ordered fallback list
    pub models: Vec<String>,
    /// Model tried first
    pub start_model: String,
    pub temperature: f32,
    pub search_temperature: f32,
    /// Per-attempt timeout
    pub timeout_secs: u64,
    /// Base URL override
    pub endpoint: Option<String>,
    /// API key (if available)
    pub api_key: Option<String>,
    /// Source of the API key
    pub key_source: KeySource,
    /// Overall status
    pub status: AIConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AIConfigStatus {
    /// AI is disabled (provider = None)
    Disabled,
    /// Provider, models and key all present
    Ready,
    /// Provider is configured but API key is missing
    MissingKey,
    /// Configuration error (e.g. zero timeout)
    Error,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
            Self::Error => "error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl ResolvedAIConfig {
    /// Resolve the effective AI configuration from settings, looking the key
    /// up in the keychain and environment.
    pub fn from_settings(settings: &AISettings) -> Self {
        let lookup = if settings.provider.needs_api_key() {
            get_api_key(settings.provider.name())
        } else {
            KeyLookup { key: None, source: KeySource::None }
        };
        Self::resolve(settings, lookup)
    }

    /// Resolve with an already looked-up key.
    pub fn resolve(settings: &AISettings, lookup: KeyLookup) -> Self {
        let provider = settings.provider;

        let mut config = Self {
            provider,
            models: Vec::new(),
            start_model: String::new(),
            temperature: settings.temperature,
            search_temperature: settings.search_temperature,
            timeout_secs: settings.timeout_secs,
            endpoint: settings.endpoint.clone().filter(|e| !e.trim().is_empty()),
            api_key: None,
            key_source: KeySource::None,
            status: AIConfigStatus::Disabled,
            blocking_reason: None,
        };

        // If disabled, return early
        if !provider.is_enabled() {
            return config;
        }

        config.models = settings.effective_models();
        config.start_model = settings.effective_start_model();
        config.api_key = lookup.key;
        config.key_source = lookup.source;

        // Missing key is the blocking issue before anything else
        let (status, reason) = if config.api_key.is_none() {
            (
                AIConfigStatus::MissingKey,
                Some(format!(
                    "No API key found. Set via keychain or {}",
                    env_var_name(provider.name())
                )),
            )
        } else if config.models.is_empty() {
            (AIConfigStatus::Error, Some("No models configured".to_string()))
        } else if config.timeout_secs == 0 {
            (AIConfigStatus::Error, Some("timeout_secs must be greater than zero".to_string()))
        } else {
            (AIConfigStatus::Ready, None)
        };
        config.status = status;
        config.blocking_reason = reason;
        config
    }
}

// ============================================================================
// Diagnostics (for CLI doctor and debugging)
// ============================================================================

/// Diagnostic information about AI configuration
#[derive(Debug, Serialize)]
pub struct AIDiagnostics {
    pub schema_version: u32,
    pub status: AIConfigStatus,
    pub blocking_reason: Option<String>,
    pub provider: String,
    pub models: Vec<String>,
    pub start_model: String,
    pub timeout_secs: u64,
    pub key_present: bool,
    pub key_source: KeySource,
    pub key_env_var: String,
    pub keychain_available: bool,
    pub endpoint: Option<String>,
}

impl AIDiagnostics {
    /// Create diagnostics from resolved config (preferred)
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            schema_version: 1,
            status: config.status,
            blocking_reason: config.blocking_reason.clone(),
            provider: config.provider.name().to_string(),
            models: config.models.clone(),
            start_model: config.start_model.clone(),
            timeout_secs: config.timeout_secs,
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            key_env_var: env_var_name(config.provider.name()),
            keychain_available: keychain_available(),
            endpoint: config.endpoint.clone(),
        }
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Doctor")?;
        writeln!(f, "---------")?;
        writeln!(f, "status:          {}", self.status.as_str())?;
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "blocking_reason: {}", reason)?;
        }
        writeln!(f, "provider:        {}", self.provider)?;
        writeln!(f, "models:          {}", if self.models.is_empty() { "(none)".to_string() } else { self.models.join(" -> ") })?;
        writeln!(f, "start_model:     {}", if self.start_model.is_empty() { "(none)" } else { self.start_model.as_str() })?;
        writeln!(f, "timeout:         {}s per attempt", self.timeout_secs)?;
        writeln!(f, "key:             {}", if self.key_present { "present" } else { "missing" })?;
        writeln!(f, "key_source:      {}", self.key_source.as_str())?;
        writeln!(f, "keychain:        {}", if self.keychain_available { "ok" } else { "unavailable" })?;
        if let Some(endpoint) = &self.endpoint {
            writeln!(f, "endpoint:        {}", endpoint)?;
        }

        // Actionable fix suggestions
        match self.status {
            AIConfigStatus::Disabled => {
                writeln!(f)?;
                writeln!(f, "AI is disabled. To enable:")?;
                writeln!(f, "  Set ai.provider in {}", crate::settings::Settings::config_path_display())?;
            }
            AIConfigStatus::MissingKey => {
                writeln!(f)?;
                writeln!(f, "Fix: set {} or store key in keychain", self.key_env_var)?;
            }
            AIConfigStatus::Ready | AIConfigStatus::Error => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemini() -> AISettings {
        AISettings { provider: AIProvider::Gemini, ..AISettings::default() }
    }

    fn key(k: &str) -> KeyLookup {
        KeyLookup { key: Some(k.to_string()), source: KeySource::Environment }
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("gemini"), "GRIDASSIST_GEMINI_KEY");
        assert_eq!(env_var_name("Gemini"), "GRIDASSIST_GEMINI_KEY");
    }

    #[test]
    fn test_keychain_account() {
        assert_eq!(keychain_account("Gemini"), "ai/gemini");
    }

    #[test]
    fn test_key_lookup_from_env() {
        env::set_var("GRIDASSIST_TESTPROVIDER_KEY", " test-key-123 ");

        let lookup = get_api_key("testprovider");
        assert_eq!(lookup.source, KeySource::Environment);
        assert_eq!(lookup.key, Some("test-key-123".to_string()));

        env::remove_var("GRIDASSIST_TESTPROVIDER_KEY");
    }

    #[test]
    fn test_key_lookup_missing() {
        let lookup = get_api_key("nonexistent_provider_xyz");
        assert_eq!(lookup.source, KeySource::None);
        assert!(lookup.key.is_none());
    }

    #[test]
    fn test_disabled() {
        let config = ResolvedAIConfig::resolve(&AISettings::default(), key("k"));
        assert_eq!(config.status, AIConfigStatus::Disabled);
        assert!(config.api_key.is_none());
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_ready_with_defaults() {
        let config = ResolvedAIConfig::resolve(&gemini(), key("k"));
        assert!(config.status.is_ready());
        assert_eq!(config.start_model, config.models[0]);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_missing_key_blocks() {
        let config = ResolvedAIConfig::resolve(&gemini(), KeyLookup { key: None, source: KeySource::None });
        assert_eq!(config.status, AIConfigStatus::MissingKey);
        assert!(config.blocking_reason.unwrap().contains("GRIDASSIST_GEMINI_KEY"));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let settings = AISettings { timeout_secs: 0, ..gemini() };
        let config = ResolvedAIConfig::resolve(&settings, key("k"));
        assert_eq!(config.status, AIConfigStatus::Error);
    }

    #[test]
    fn test_diagnostics_json_shape() {
        let config = ResolvedAIConfig::resolve(&gemini(), key("secret"));
        let diag = AIDiagnostics::from_resolved(&config);
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["key_source"], "environment");
        assert_eq!(json["provider"], "gemini");
        assert!(!json.to_string().contains("secret"));
        assert!(diag.to_string().contains("gemini-2.5-flash -> gemini-2.5-pro"));
    }
}
