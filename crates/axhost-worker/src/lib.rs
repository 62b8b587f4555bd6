//! Embedding application for the worker process host.
//!
//! [`run`] performs the whole process lifecycle: it loads the layered
//! configuration, installs structured telemetry on stderr, builds the
//! operation registry for the configured [`WorkerVariant`], and serves the
//! controller over stdin and stdout until the host stops. SIGINT and SIGTERM
//! request a graceful shutdown through the host's [`ShutdownHandle`].
//!
//! [`WorkerVariant`]: axhost_config::WorkerVariant
//! [`ShutdownHandle`]: axhost::ShutdownHandle

mod operations;
mod signals;

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use axhost::{
    HostError, HostSettings, OperationRegistry, ProcessHost, RegistryError, StopReport,
    TelemetryError, telemetry,
};
use axhost_config::{Config, ConfigError};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{error, info};

pub use self::operations::{
    DelayParams, DelayResult, HeartbeatResult, ProcessInfoResult, base_operations, registry_for,
};

/// Tracing target for process lifecycle events.
const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

/// Abstracts configuration loading so tests can substitute fixed values.
pub trait ConfigLoader {
    /// Loads the worker configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or parsed.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, files, environment, and the given arguments.
#[derive(Debug, Clone)]
pub struct ArgsConfigLoader {
    args: Vec<OsString>,
}

impl ArgsConfigLoader {
    /// Creates a loader for the given command line, program name included.
    #[must_use]
    pub fn new<I>(args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        Self {
            args: args.into_iter().collect(),
        }
    }
}

impl ConfigLoader for ArgsConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(self.args.iter().cloned())
    }
}

/// Errors that stop the worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The loaded configuration cannot drive the host.
    #[error("invalid configuration: {source}")]
    InvalidConfiguration {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The operation registry could not be built.
    #[error("failed to build the operation registry: {source}")]
    Registry {
        /// Registration failure.
        #[source]
        source: RegistryError,
    },
    /// The async runtime could not be started.
    #[error("failed to start the runtime: {source}")]
    Runtime {
        /// Runtime builder error.
        #[source]
        source: io::Error,
    },
    /// Signal listeners could not be installed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Signal registration error.
        #[source]
        source: io::Error,
    },
    /// The host stopped because of a channel fault.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Runs the worker process and returns its exit status.
///
/// Errors are logged when telemetry is available and always written to
/// `stderr`.
pub fn run<I, E>(args: I, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    E: Write,
{
    run_with_loader(&ArgsConfigLoader::new(args), stderr)
}

/// Runs the worker process with a caller-supplied configuration loader.
pub fn run_with_loader<E>(loader: &dyn ConfigLoader, stderr: &mut E) -> ExitCode
where
    E: Write,
{
    match bootstrap_and_serve(loader) {
        Ok(report) => {
            info!(
                target: WORKER_TARGET,
                cause = %report.cause,
                drain = ?report.drain,
                "worker exiting"
            );
            ExitCode::SUCCESS
        }
        Err(worker_error) => {
            error!(target: WORKER_TARGET, error = %worker_error, "worker failed");
            let _ = writeln!(stderr, "axhost-worker: {worker_error}");
            ExitCode::FAILURE
        }
    }
}

fn bootstrap_and_serve(loader: &dyn ConfigLoader) -> Result<StopReport, WorkerError> {
    let config = loader
        .load()
        .map_err(|source| WorkerError::Configuration { source })?;
    config
        .validate()
        .map_err(|source| WorkerError::InvalidConfiguration { source })?;
    let _telemetry =
        telemetry::initialise(&config).map_err(|source| WorkerError::Telemetry { source })?;

    let variant = config.variant();
    let registry = registry_for(variant).map_err(|source| WorkerError::Registry { source })?;
    info!(
        target: WORKER_TARGET,
        variant = %variant,
        operations = ?registry.names(),
        "operation registry ready"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| WorkerError::Runtime { source })?;
    let result = runtime.block_on(serve(Arc::new(registry), HostSettings::from_config(&config)));
    // Blocked stdin reads cannot be interrupted; do not wait for them.
    runtime.shutdown_background();
    result
}

async fn serve(
    registry: Arc<OperationRegistry>,
    settings: HostSettings,
) -> Result<StopReport, WorkerError> {
    let host = ProcessHost::new(registry, settings);
    let listener = signals::forward_shutdown_signals(host.shutdown_handle())
        .map_err(|source| WorkerError::Signals { source })?;
    let result = host.run(tokio::io::stdin(), tokio::io::stdout()).await;
    listener.abort();
    result.map_err(WorkerError::from)
}
