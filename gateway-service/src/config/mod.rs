use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Gemini REST endpoint used when `GEMINI_API_BASE` is not set.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Uploads larger than this are rejected before reaching the model (20MB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub models: ModelConfig,
    pub google: GoogleConfig,
    pub uploads: UploadConfig,
    pub provider: ProviderKind,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model used for every endpoint (e.g., gemini-2.5-flash)
    pub text_model: String,
    /// Timeout applied to each outgoing model call
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory holding in-flight uploads; each file lives for one request.
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Which model backend serves generation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_source(common_config, |key| env::var(key).ok())
    }

    /// Builds the gateway config from an arbitrary key lookup.
    pub fn from_source<F>(mut common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";

        // Plain PORT wins over APP__PORT so existing deployments keep working.
        if let Some(port) = lookup("PORT") {
            common.port = parse_value("PORT", &port)?;
        }

        let provider: ProviderKind = get_env(&lookup, "GENAI_PROVIDER", Some("gemini"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        // The key is only optional when nothing will ever call Gemini.
        let api_key = match lookup("GEMINI_API_KEY").or_else(|| lookup("Gemini_API")) {
            Some(key) => key,
            None if provider == ProviderKind::Mock && !is_prod => String::new(),
            None => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GEMINI_API_KEY is required but not set"
                )))
            }
        };

        let request_timeout_secs: u64 = parse_value(
            "GENAI_REQUEST_TIMEOUT_SECS",
            &get_env(
                &lookup,
                "GENAI_REQUEST_TIMEOUT_SECS",
                Some(&DEFAULT_REQUEST_TIMEOUT_SECS.to_string()),
                false,
            )?,
        )?;

        Ok(GatewayConfig {
            common,
            models: ModelConfig {
                text_model: get_env(&lookup, "GENAI_TEXT_MODEL", Some("gemini-2.5-flash"), false)?,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            google: GoogleConfig {
                api_key: Secret::new(api_key),
                api_base: get_env(
                    &lookup,
                    "GEMINI_API_BASE",
                    Some(DEFAULT_GEMINI_API_BASE),
                    false,
                )?
                .trim_end_matches('/')
                .to_string(),
            },
            uploads: UploadConfig {
                dir: PathBuf::from(get_env(&lookup, "UPLOAD_DIR", Some("uploads"), false)?),
                max_bytes: parse_value(
                    "MAX_UPLOAD_BYTES",
                    &get_env(
                        &lookup,
                        "MAX_UPLOAD_BYTES",
                        Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
                        false,
                    )?,
                )?,
            },
            provider,
        })
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
    })
}
