pub mod auth;
pub mod bootstrap;
pub mod catalog;
pub mod core;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod upstream_client;

pub use auth::{AuthProvider, NoopAuth, StaticKeyAuth};
pub use bootstrap::{Bootstrap, bootstrap, bootstrap_with_client};
pub use catalog::{CatalogSource, ModelCatalog};
pub use core::{Core, CoreState};
pub use error::ProxyError;
pub use middleware::REQUEST_ID_HEADER;
pub use upstream_client::{UpstreamClientConfig, WreqUpstreamClient};
