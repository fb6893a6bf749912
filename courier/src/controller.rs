use std::{
    path::{Path, PathBuf},
    pin::pin,
    sync::Arc,
};

use courier_common::{Recipient, internal, logging};
use courier_delivery::{DeliveryStatus, DispatchConfig, Dispatcher, Provider, SimulatedProvider};
use futures_util::future::join_all;
use serde::Deserialize;

const CONFIG_ENV: &str = "COURIER_CONFIG";

const DEFAULT_PATHS: [&str; 2] = ["./courier.config.ron", "/etc/courier/courier.config.ron"];

/// Top-level configuration for the `courier` binary
///
/// ```ron
/// Courier (
///     dispatch: (
///         retry: (max_attempts: 3, base_backoff_ms: 1000),
///     ),
///     providers: [
///         (name: "ProviderA", success_rate: 0.5),
///         (name: "ProviderB", success_rate: 0.5),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Courier {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Providers in priority order
    #[serde(alias = "provider", default = "default_providers")]
    pub providers: Vec<SimulatedProvider>,
}

fn default_providers() -> Vec<SimulatedProvider> {
    vec![
        SimulatedProvider::new("ProviderA", 0.5),
        SimulatedProvider::new("ProviderB", 0.5),
    ]
}

impl Default for Courier {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            providers: default_providers(),
        }
    }
}

/// Find the configuration file using the following precedence:
/// 1. `explicit`, normally from `--config`
/// 2. `COURIER_CONFIG` environment variable
/// 3. ./courier.config.ron (current working directory)
/// 4. /etc/courier/courier.config.ron (system-wide config)
///
/// `Ok(None)` means nothing was found and the built-in defaults apply.
///
/// # Errors
///
/// If an explicitly requested file does not exist
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

impl Courier {
    /// Read a configuration from `path`
    ///
    /// # Errors
    ///
    /// If the file can't be read or is not a valid configuration
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }

    /// Locate and read the configuration, falling back to the defaults
    ///
    /// # Errors
    ///
    /// See [`find_config_file`] and [`Courier::from_file`]
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match find_config_file(explicit)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn into_dispatcher(self) -> anyhow::Result<Dispatcher> {
        let providers = self
            .providers
            .into_iter()
            .map(|provider| {
                provider.validate()?;
                Ok(Arc::new(provider) as Arc<dyn Provider>)
            })
            .collect::<Result<Vec<_>, courier_delivery::ConfigError>>()?;

        Ok(Dispatcher::new(self.dispatch, providers)?)
    }

    /// Dispatch to every recipient concurrently and report where each ended up.
    ///
    /// A termination signal abandons pending retry backoffs; the affected
    /// recipients are reported as failed.
    ///
    /// # Errors
    ///
    /// If the configuration is invalid
    #[tracing::instrument(level = "trace", skip_all, fields(recipients = recipients.len()), err)]
    pub async fn run(
        self,
        recipients: Vec<Recipient>,
    ) -> anyhow::Result<Vec<(Recipient, DeliveryStatus)>> {
        logging::init();

        let dispatcher = self.into_dispatcher()?;
        internal!(level = INFO, "Dispatching to {} recipient(s)", recipients.len());

        {
            let mut deliveries = pin!(join_all(
                recipients.iter().map(|recipient| dispatcher.dispatch(recipient))
            ));

            tokio::select! {
                _ = &mut deliveries => {}
                signal = shutdown_signal() => {
                    match signal {
                        Ok(()) => dispatcher.shutdown(),
                        Err(e) => tracing::warn!("Unable to listen for shutdown signals: {e}"),
                    }
                    deliveries.await;
                }
            }
        }

        internal!("All dispatches finished");

        Ok(recipients
            .into_iter()
            .map(|recipient| {
                let status = dispatcher.status(&recipient);
                (recipient, status)
            })
            .collect())
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, abandoning pending retries");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, abandoning pending retries");
        }
    };

    Ok(())
}
