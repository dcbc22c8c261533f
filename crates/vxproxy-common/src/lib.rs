use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Which upstream API serves `/v1/chat/completions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Translate to Gemini `generateContent`.
    #[default]
    Native,
    /// Forward to the Vertex OpenAI-compatible endpoint.
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for UpstreamMode {
    type Err = GlobalConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" | "gemini" => Ok(UpstreamMode::Native),
            "openai" => Ok(UpstreamMode::OpenAi),
            _ => Err(GlobalConfigError::InvalidValue {
                field: "upstream_mode",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for UpstreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpstreamMode::Native => "native",
            UpstreamMode::OpenAi => "openai",
        })
    }
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > defaults.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Shared key clients must present. `None` disables auth.
    pub api_key: Option<String>,
    /// Express-mode API keys; never empty.
    pub vertex_keys: Vec<String>,
    pub round_robin: bool,
    pub project_id: Option<String>,
    pub location: String,
    pub retry_max: u32,
    pub retry_interval_ms: u64,
    pub models_config_url: Option<String>,
    pub models_file: String,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
    /// Set when a custom certificate file is configured; upstream TLS
    /// verification is then disabled.
    pub ssl_cert_file: Option<String>,
    pub safety_score: bool,
    pub upstream_mode: UpstreamMode,
}

impl GlobalConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn insecure_tls(&self) -> bool {
        self.ssl_cert_file.is_some()
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("vertex_keys", &self.vertex_keys.len())
            .field("round_robin", &self.round_robin)
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("retry_max", &self.retry_max)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .field("models_config_url", &self.models_config_url)
            .field("models_file", &self.models_file)
            .field("proxy", &self.proxy)
            .field("ssl_cert_file", &self.ssl_cert_file)
            .field("safety_score", &self.safety_score)
            .field("upstream_mode", &self.upstream_mode)
            .finish()
    }
}

/// Optional layer used for merging global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub vertex_keys: Option<Vec<String>>,
    pub round_robin: Option<bool>,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub retry_max: Option<u32>,
    pub retry_interval_ms: Option<u64>,
    pub models_config_url: Option<String>,
    pub models_file: Option<String>,
    pub proxy: Option<String>,
    pub ssl_cert_file: Option<String>,
    pub safety_score: Option<bool>,
    pub upstream_mode: Option<UpstreamMode>,
}

macro_rules! overlay_fields {
    ($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )+
    };
}

impl GlobalConfigPatch {
    /// Reads the environment layer through `lookup`. Empty values count as unset.
    pub fn from_env<F>(lookup: F) -> Result<Self, GlobalConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Ok(Self {
            host: get("APP_HOST"),
            port: get("APP_PORT")
                .map(|v| parse_number("APP_PORT", &v))
                .transpose()?,
            api_key: get("API_KEY"),
            vertex_keys: get("VERTEX_EXPRESS_API_KEY").map(|v| parse_keys(&v)),
            round_robin: get("ROUNDROBIN").map(|v| parse_flag(&v)),
            project_id: get("GCP_PROJECT_ID"),
            location: get("GCP_LOCATION"),
            retry_max: get("RETRY_MAX")
                .map(|v| parse_number("RETRY_MAX", &v))
                .transpose()?,
            retry_interval_ms: get("RETRY_INTERVAL_MS")
                .map(|v| parse_number("RETRY_INTERVAL_MS", &v))
                .transpose()?,
            models_config_url: get("MODELS_CONFIG_URL"),
            models_file: get("MODELS_FILE"),
            proxy: get("PROXY_URL"),
            ssl_cert_file: get("SSL_CERT_FILE"),
            safety_score: get("SAFETY_SCORE").map(|v| parse_flag(&v)),
            upstream_mode: get("UPSTREAM_MODE").map(|v| v.parse()).transpose()?,
        })
    }

    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        overlay_fields!(
            self,
            other,
            host,
            port,
            api_key,
            vertex_keys,
            round_robin,
            project_id,
            location,
            retry_max,
            retry_interval_ms,
            models_config_url,
            models_file,
            proxy,
            ssl_cert_file,
            safety_score,
            upstream_mode,
        );
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let vertex_keys = self
            .vertex_keys
            .filter(|keys| !keys.is_empty())
            .ok_or(GlobalConfigError::MissingField("VERTEX_EXPRESS_API_KEY"))?;
        let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8080),
            api_key: non_blank(self.api_key),
            vertex_keys,
            round_robin: self.round_robin.unwrap_or(false),
            project_id: non_blank(self.project_id),
            location: non_blank(self.location).unwrap_or_else(|| "global".to_string()),
            retry_max: self.retry_max.unwrap_or(3),
            retry_interval_ms: self.retry_interval_ms.unwrap_or(1000),
            models_config_url: non_blank(self.models_config_url),
            models_file: self
                .models_file
                .unwrap_or_else(|| "vertexModels.json".to_string()),
            proxy: non_blank(self.proxy),
            ssl_cert_file: non_blank(self.ssl_cert_file),
            safety_score: self.safety_score.unwrap_or(false),
            upstream_mode: self.upstream_mode.unwrap_or_default(),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            api_key: value.api_key,
            vertex_keys: Some(value.vertex_keys),
            round_robin: Some(value.round_robin),
            project_id: value.project_id,
            location: Some(value.location),
            retry_max: Some(value.retry_max),
            retry_interval_ms: Some(value.retry_interval_ms),
            models_config_url: value.models_config_url,
            models_file: Some(value.models_file),
            proxy: value.proxy,
            ssl_cert_file: value.ssl_cert_file,
            safety_score: Some(value.safety_score),
            upstream_mode: Some(value.upstream_mode),
        }
    }
}

/// Comma-separated list; entries are trimmed and empties dropped.
pub fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// `true`, `1` and `yes` (any case) are true; anything else is false.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, GlobalConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| GlobalConfigError::InvalidValue {
            field,
            value: raw.to_string(),
        })
}
