use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use vxproxy_protocol::gemini::list_models as gemini_models;
use vxproxy_protocol::openai::list_models as openai_models;
use vxproxy_provider_core::{UpstreamClient, UpstreamHttpRequest};
use vxproxy_transform::{ModelTarget, ThinkingTier};

pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-001",
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash-lite-001",
    "gemini-2.5-flash",
    "gemini-2.5-flash-image",
    "gemini-2.5-flash-image-preview",
    "gemini-2.5-flash-lite-preview-09-2025",
    "gemini-2.5-flash-preview-09-2025",
    "gemini-2.5-pro",
    "gemini-3-flash-preview",
    "gemini-3-pro-image-preview",
    "gemini-3-pro-preview",
];

const OWNER: &str = "google";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAlias {
    pub name: String,
    pub target: ModelTarget,
}

fn default_aliases() -> Vec<ModelAlias> {
    [
        ("gemini-3-pro-preview-high", ThinkingTier::High),
        ("gemini-3-pro-preview-low", ThinkingTier::Low),
    ]
    .into_iter()
    .map(|(name, tier)| ModelAlias {
        name: name.to_string(),
        target: ModelTarget {
            model: "gemini-3-pro-preview".to_string(),
            thinking: Some(tier),
        },
    })
    .collect()
}

/// Where the model list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    File(String),
    Url(String),
    Defaults,
}

/// Models advertised to clients plus the alias table used for routing.
/// Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<String>,
    aliases: Vec<ModelAlias>,
    created: i64,
    source: CatalogSource,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelsDocument {
    List(Vec<String>),
    Object {
        #[serde(default)]
        vertex_express_models: Vec<String>,
        #[serde(default)]
        vertex_models: Vec<String>,
    },
}

/// Accepts a bare array of ids or an object keyed by
/// `vertex_express_models` (preferred) / `vertex_models`. Empty lists count
/// as absent.
pub fn parse_models_document(data: &[u8]) -> Option<Vec<String>> {
    let models = match serde_json::from_slice::<ModelsDocument>(data).ok()? {
        ModelsDocument::List(models) => models,
        ModelsDocument::Object {
            vertex_express_models,
            vertex_models,
        } => {
            if vertex_express_models.is_empty() {
                vertex_models
            } else {
                vertex_express_models
            }
        }
    };
    (!models.is_empty()).then_some(models)
}

impl ModelCatalog {
    pub fn new(models: Vec<String>, source: CatalogSource) -> Self {
        Self {
            models,
            aliases: default_aliases(),
            created: OffsetDateTime::now_utc().unix_timestamp(),
            source,
        }
    }

    pub fn defaults() -> Self {
        Self::new(
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            CatalogSource::Defaults,
        )
    }

    /// Tries the local file, then the remote URL, then the built-in list.
    pub async fn load(file: &str, url: Option<&str>, client: &dyn UpstreamClient) -> Self {
        match tokio::fs::read(file).await {
            Ok(data) => match parse_models_document(&data) {
                Some(models) => return Self::loaded(models, CatalogSource::File(file.to_string())),
                None => warn!(event = "models_file_invalid", path = %file),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(event = "models_file_unreadable", path = %file, error = %err),
        }

        if let Some(url) = url {
            if let Some(models) = fetch_remote(url, client).await {
                return Self::loaded(models, CatalogSource::Url(url.to_string()));
            }
        }

        Self::loaded(
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            CatalogSource::Defaults,
        )
    }

    fn loaded(models: Vec<String>, source: CatalogSource) -> Self {
        let catalog = Self::new(models, source);
        info!(
            event = "models_loaded",
            source = ?catalog.source,
            models = catalog.models.len(),
            aliases = catalog.aliases.len()
        );
        catalog
    }

    /// Alias target with its thinking tier, or the name unchanged.
    pub fn resolve(&self, name: &str) -> ModelTarget {
        self.aliases
            .iter()
            .find(|alias| alias.name == name)
            .map(|alias| alias.target.clone())
            .unwrap_or_else(|| ModelTarget::plain(name))
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.models
            .iter()
            .map(|model| (model.as_str(), model.as_str()))
            .chain(
                self.aliases
                    .iter()
                    .map(|alias| (alias.name.as_str(), alias.target.model.as_str())),
            )
    }

    pub fn openai_list(&self) -> openai_models::ListModelsResponse {
        openai_models::ListModelsResponse {
            object: openai_models::ListObjectType::List,
            data: self
                .entries()
                .map(|(id, root)| openai_models::Model {
                    id: id.to_string(),
                    object: openai_models::ModelObjectType::Model,
                    created: self.created,
                    owned_by: OWNER.to_string(),
                    root: Some(root.to_string()),
                })
                .collect(),
        }
    }

    pub fn gemini_list(&self) -> gemini_models::ListModelsResponse {
        gemini_models::ListModelsResponse {
            models: self
                .entries()
                .map(|(id, _)| gemini_models::Model {
                    name: format!("models/{id}"),
                    display_name: id.to_string(),
                })
                .collect(),
            next_page_token: None,
        }
    }
}

async fn fetch_remote(url: &str, client: &dyn UpstreamClient) -> Option<Vec<String>> {
    let response = match client.send(UpstreamHttpRequest::get(url)).await {
        Ok(response) => response,
        Err(err) => {
            warn!(event = "models_url_failed", url = %url, error = ?err);
            return None;
        }
    };
    let status = response.status;
    let body = match response.body.collect().await {
        Ok(body) => body,
        Err(err) => {
            warn!(event = "models_url_failed", url = %url, error = ?err);
            return None;
        }
    };
    let models = parse_models_document(&body);
    if models.is_none() {
        warn!(event = "models_url_invalid", url = %url, status);
    }
    models
}
