//! The warm environment: everything prepared once and reused by every
//! invocation the process serves.

use std::sync::Arc;
use std::time::Instant;

use sitehook_core::{obs, BuildConfig, Redactor, SitehookError, Stage};
use sitehook_store::{
    ContentStore, FsObjectStore, HttpResourceStore, ResourceStore, StoreError, StoreLocation,
};
use sitehook_toolchain::{standard_artifacts, Bootstrapper, Toolchain};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::EnvironmentError;
use crate::orchestrator::BuildOrchestrator;
use crate::publish::{PublishSummary, PublishTarget, Publisher};
use crate::runner::ProcessRunner;
use crate::workspace::WorkspacePaths;

/// Where the site is published, before the toolchain exists.
pub enum SiteDestination {
    Store(Arc<dyn ContentStore>),
    /// Bucket URI handed to the sync CLI
    Bucket(String),
}

impl SiteDestination {
    /// Only a bucket is published through the sync CLI, so only a bucket
    /// needs it provisioned.
    pub fn needs_sync_cli(&self) -> bool {
        matches!(self, SiteDestination::Bucket(_))
    }
}

/// Provisioned toolchain, workspace and publisher for one process lifetime.
///
/// Builds are serialized: the orchestrator sits behind a lock held from
/// fetch through publish, since every run shares the same workspace.
pub struct WarmEnvironment {
    toolchain: Arc<Toolchain>,
    orchestrator: Mutex<BuildOrchestrator>,
    publisher: Publisher,
    redactor: Redactor,
}

impl WarmEnvironment {
    /// Warm up using the stores named in `config`.
    pub async fn warm_up(config: &BuildConfig) -> Result<Self, EnvironmentError> {
        let resources: Arc<dyn ResourceStore> = match &config.resource_store {
            StoreLocation::Directory(path) => Arc::new(FsObjectStore::new(path)?),
            StoreLocation::Http(url) => Arc::new(HttpResourceStore::new(url)?),
            StoreLocation::Bucket(uri) => {
                return Err(StoreError::InvalidLocation {
                    location: uri.clone(),
                }
                .into())
            }
        };
        let site = match &config.site_store {
            StoreLocation::Directory(path) => SiteDestination::Store(Arc::new(FsObjectStore::new(path)?)),
            StoreLocation::Bucket(uri) => SiteDestination::Bucket(uri.clone()),
            StoreLocation::Http(url) => {
                return Err(StoreError::InvalidLocation {
                    location: url.clone(),
                }
                .into())
            }
        };
        Self::warm_up_with(config, resources, site).await
    }

    /// Warm up against explicit stores.
    ///
    /// Provisions every tool, prepares the workspace and, in pull mode,
    /// primes the checkout. Any failure leaves nothing usable behind.
    pub async fn warm_up_with(
        config: &BuildConfig,
        resources: Arc<dyn ResourceStore>,
        site: SiteDestination,
    ) -> Result<Self, EnvironmentError> {
        let started = Instant::now();
        let paths = WorkspacePaths::new(&config.scratch_dir);
        paths.prepare().map_err(EnvironmentError::Workspace)?;

        let mut names = config.artifacts.clone();
        if !site.needs_sync_cli() {
            names.sync_cli_archive = None;
        }
        let artifacts = standard_artifacts(paths.tools(), &names);
        let toolchain = Arc::new(Bootstrapper::new(resources).provision(&artifacts).await?);

        let mut redactor = Redactor::new().with(config.webhook_secret.expose());
        if let Some(credentials) = url_credentials(&config.repo_url) {
            redactor.add(credentials);
        }

        let runner = ProcessRunner::new(toolchain.clone()).with_redactor(redactor.clone());
        let orchestrator =
            BuildOrchestrator::new(runner.clone(), paths, &config.repo_url, config.fetch_mode);
        orchestrator.prime().await.map_err(EnvironmentError::Prime)?;

        let target = match site {
            SiteDestination::Store(store) => PublishTarget::Store(store),
            SiteDestination::Bucket(destination) => PublishTarget::SyncCli {
                destination,
                runner,
            },
        };
        let publisher = Publisher::new(target, config.publish_strategy, &config.cache_control)
            .map_err(EnvironmentError::Publisher)?;

        info!(
            event = "environment.ready",
            tools = artifacts.len(),
            fetch_mode = ?config.fetch_mode,
            publish_strategy = ?config.publish_strategy,
            duration_ms = obs::elapsed_ms(started),
        );
        Ok(Self {
            toolchain,
            orchestrator: Mutex::new(orchestrator),
            publisher,
            redactor,
        })
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Secrets this environment knows about, for response redaction.
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Fetch, generate and publish under the environment lock.
    ///
    /// Publish only runs after fetch and generate both succeed.
    pub async fn run_build(&self) -> Result<PublishSummary, SitehookError> {
        let mut orchestrator = self.orchestrator.lock().await;

        let missing = self.toolchain.missing_tools();
        if !missing.is_empty() {
            return Err(SitehookError::ProvisioningFailure(format!(
                "provisioned tools have disappeared: {}",
                missing.join(", ")
            )));
        }

        orchestrator
            .run()
            .await
            .map_err(|failure| SitehookError::PipelineStageFailure {
                stage: failure.stage,
                detail: failure.error.to_string(),
            })?;

        obs::emit_stage_started(Stage::Publish);
        let started = Instant::now();
        let result = self.publisher.publish(orchestrator.paths().output()).await;
        obs::emit_stage_finished(Stage::Publish, obs::elapsed_ms(started), result.is_ok());

        result.map_err(|e| SitehookError::PipelineStageFailure {
            stage: Stage::Publish,
            detail: e.to_string(),
        })
    }
}

/// The `user[:password]` part of a URL, if any.
fn url_credentials(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?;
    let (userinfo, _) = authority.rsplit_once('@')?;
    Some(userinfo.to_string()).filter(|u| !u.is_empty())
}
