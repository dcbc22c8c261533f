use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;

use vxproxy_common::GlobalConfig;
use vxproxy_provider_core::{
    CredentialPool, ProbeProjectResolver, ProjectIdPatterns, RetryPolicy, SelectionPolicy,
    UpstreamClient,
};

use crate::auth::auth_provider;
use crate::catalog::ModelCatalog;
use crate::core::{Core, CoreState};
use crate::upstream_client::{UpstreamClientConfig, WreqUpstreamClient};

pub struct Bootstrap {
    pub global: GlobalConfig,
    pub core: Core,
}

/// Builds the wreq client and everything that hangs off it.
pub async fn bootstrap(global: GlobalConfig) -> anyhow::Result<Bootstrap> {
    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_global(&global))
        .context("build upstream client")?;
    bootstrap_with_client(global, Arc::new(client)).await
}

pub async fn bootstrap_with_client(
    global: GlobalConfig,
    client: Arc<dyn UpstreamClient>,
) -> anyhow::Result<Bootstrap> {
    let patterns = ProjectIdPatterns::standard().context("compile project id patterns")?;
    let resolver = ProbeProjectResolver::new(client.clone(), global.location.clone(), patterns);

    let policy = if global.round_robin {
        SelectionPolicy::RoundRobin
    } else {
        SelectionPolicy::Random
    };
    let pool = CredentialPool::new(global.vertex_keys.clone(), policy, Arc::new(resolver))
        .context("build credential pool")?
        .with_fixed_project(global.project_id.clone());

    let catalog = ModelCatalog::load(
        &global.models_file,
        global.models_config_url.as_deref(),
        client.as_ref(),
    )
    .await;

    let retry = RetryPolicy {
        max_retries: global.retry_max,
        interval: Duration::from_millis(global.retry_interval_ms),
        switch_credential: true,
    };

    info!(
        event = "config_loaded",
        bind = %global.bind_addr(),
        keys = pool.count(),
        policy = ?pool.policy(),
        location = %global.location,
        fixed_project = global.project_id.is_some(),
        retry_max = retry.max_retries,
        retry_interval_ms = global.retry_interval_ms,
        upstream_mode = %global.upstream_mode,
        auth = global.api_key.is_some(),
        proxy = global.proxy.is_some(),
        insecure_tls = global.insecure_tls(),
        safety_score = global.safety_score
    );

    let state = CoreState {
        pool: Arc::new(pool),
        client,
        catalog: Arc::new(catalog),
        auth: auth_provider(global.api_key.as_deref()),
        retry,
        location: global.location.clone(),
        upstream_mode: global.upstream_mode,
        started_at: Instant::now(),
    };

    Ok(Bootstrap {
        global,
        core: Core::new(state),
    })
}
