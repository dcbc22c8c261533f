use clap::Parser;
use vxproxy_common::{GlobalConfigPatch, UpstreamMode, parse_flag, parse_keys};

/// Flags override the environment; unset flags leave it alone.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vxproxy",
    version,
    about = "OpenAI-compatible gateway for Vertex AI express mode"
)]
pub(crate) struct Cli {
    /// Bind host.
    #[arg(long)]
    pub(crate) host: Option<String>,

    /// Bind port.
    #[arg(long)]
    pub(crate) port: Option<u16>,

    /// Shared client key. Auth is disabled when unset.
    #[arg(long)]
    pub(crate) api_key: Option<String>,

    /// Comma-separated express-mode API keys.
    #[arg(long)]
    pub(crate) vertex_keys: Option<String>,

    /// Rotate keys in order instead of picking at random.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub(crate) round_robin: Option<String>,

    /// Skip project discovery and use this project for every key.
    #[arg(long)]
    pub(crate) project_id: Option<String>,

    #[arg(long)]
    pub(crate) location: Option<String>,

    #[arg(long)]
    pub(crate) retry_max: Option<u32>,

    #[arg(long)]
    pub(crate) retry_interval_ms: Option<u64>,

    #[arg(long)]
    pub(crate) models_config_url: Option<String>,

    #[arg(long)]
    pub(crate) models_file: Option<String>,

    /// Outbound proxy for upstream requests.
    #[arg(long)]
    pub(crate) proxy: Option<String>,

    /// Accept self-signed upstream certificates.
    #[arg(long)]
    pub(crate) ssl_cert_file: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub(crate) safety_score: Option<String>,

    /// `native` (Gemini generateContent) or `openai` (OpenAI-compatible endpoint).
    #[arg(long)]
    pub(crate) upstream_mode: Option<UpstreamMode>,
}

impl Cli {
    pub(crate) fn into_patch(self) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.host,
            port: self.port,
            api_key: self.api_key,
            vertex_keys: self.vertex_keys.as_deref().map(parse_keys),
            round_robin: self.round_robin.as_deref().map(parse_flag),
            project_id: self.project_id,
            location: self.location,
            retry_max: self.retry_max,
            retry_interval_ms: self.retry_interval_ms,
            models_config_url: self.models_config_url,
            models_file: self.models_file,
            proxy: self.proxy,
            ssl_cert_file: self.ssl_cert_file,
            safety_score: self.safety_score.as_deref().map(parse_flag),
            upstream_mode: self.upstream_mode,
        }
    }
}
