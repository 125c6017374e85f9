//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport and
//! credential supplier) into the sync core. Desktop and server hosts enable
//! the `desktop-shims` feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_site`]; embedders with their own transports use
//! [`connect_site`] directly.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{backend::CredentialSupplier, http::HttpClient};
use core_runtime::config::{SiteConfig, SyncServerConfig};
use core_sync::SyncProvider;
use provider_google_drive::GoogleDriveBackend;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds and activates a session for one site on top of explicit bridges.
///
/// Fails with a configuration error before any network traffic when the site
/// declaration is invalid.
pub async fn connect_site(
    site: &SiteConfig,
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialSupplier>,
    shutdown: CancellationToken,
) -> Result<Arc<SyncProvider>> {
    site.validate()?;

    let backend = GoogleDriveBackend::new(http_client, credentials, &site.settings);
    let provider = SyncProvider::new(site.clone(), Arc::new(backend), shutdown);
    provider.activate().await?;

    info!(site = %site.site_name, "Site connected");
    Ok(Arc::new(provider))
}

/// Looks up `site` in the preset and connects it with the desktop bridges.
///
/// ```ignore
/// use core_runtime::config::SyncServerConfig;
/// use tokio_util::sync::CancellationToken;
///
/// let config = SyncServerConfig::from_path("/etc/asset-sync/sites.json")?;
/// let provider = core_service::bootstrap_site(&config, "gdrive", CancellationToken::new()).await?;
/// provider.upload_file(local, "/My Drive/proj/sh010", false).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_site(
    config: &SyncServerConfig,
    site: &str,
    shutdown: CancellationToken,
) -> Result<Arc<SyncProvider>> {
    use bridge_desktop::{FileTokenSupplier, ReqwestHttpClient};

    let site = config.site(site)?;
    let http_client = ReqwestHttpClient::with_timeout(site.settings.request_timeout)
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    let credentials = FileTokenSupplier::new(&site.credentials_path);

    connect_site(site, Arc::new(http_client), Arc::new(credentials), shutdown).await
}

/// Looks up `site` in the preset without connecting it.
pub fn site_config<'a>(config: &'a SyncServerConfig, site: &str) -> Result<&'a SiteConfig> {
    Ok(config.site(site)?)
}
