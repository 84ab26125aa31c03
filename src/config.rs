use anyhow::{bail, Result};

/// Environment variable names. Secrets are always sourced from the
/// environment, never from literals in the code.
pub const TELEGRAM_TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";
pub const GROQ_MODEL_VAR: &str = "GROQ_MODEL";
pub const GROQ_BASE_URL_VAR: &str = "GROQ_BASE_URL";
pub const REMBG_ENDPOINT_VAR: &str = "REMBG_ENDPOINT";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct RembgConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub groq: GroqConfig,
    pub rembg: RembgConfig,
}

fn default_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_rembg_endpoint() -> String {
    "http://localhost:7000/api/remove".to_string()
}

impl Config {
    /// Load configuration from the process environment. Both secrets are
    /// required; startup must not proceed without them.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Lets tests
    /// drive the loader without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = require(&lookup, TELEGRAM_TOKEN_VAR)?;
        let api_key = require(&lookup, GROQ_API_KEY_VAR)?;

        Ok(Self {
            telegram: TelegramConfig { bot_token },
            groq: GroqConfig {
                api_key,
                model: optional(&lookup, GROQ_MODEL_VAR).unwrap_or_else(default_model),
                base_url: optional(&lookup, GROQ_BASE_URL_VAR).unwrap_or_else(default_base_url),
            },
            rembg: RembgConfig {
                endpoint: optional(&lookup, REMBG_ENDPOINT_VAR)
                    .unwrap_or_else(default_rembg_endpoint),
            },
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match optional(lookup, name) {
        Some(value) => Ok(value),
        None => bail!("required environment variable {} is not set", name),
    }
}

/// Empty values are treated the same as unset ones.
fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Mask a secret for logging: first 7 + "***" + last 4 characters, or "***"
/// entirely for short values.
pub fn mask_secret(secret: &str) -> String {
    if secret.len() <= 11 {
        return "***".to_string();
    }
    format!("{}***{}", &secret[..7], &secret[secret.len() - 4..])
}
