//! Build orchestration: fetch the source, then generate the site.
//!
//! Linear state machine `Idle -> Fetching -> Generating -> Done`, with
//! `Failed(stage)` reachable from either working state. Every external step
//! is judged by its exit status; captured output only feeds diagnostics.

use std::time::Instant;

use sitehook_core::obs;
use sitehook_core::{FetchMode, Stage};
use thiserror::Error;
use tracing::info;

use crate::error::{tail, BuildError};
use crate::runner::{CommandOutput, CommandSpec, ProcessRunner};
use crate::workspace::WorkspacePaths;

const VCS: &str = "git";
const GENERATOR: &str = "hugo";
const DIAGNOSTIC_LINES: usize = 5;

/// Where the orchestrator is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Fetching,
    Generating,
    Done,
    Failed(Stage),
}

/// A run stopped at `stage`.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: BuildError,
}

/// Runs fetch and generate against the shared workspace.
#[derive(Debug)]
pub struct BuildOrchestrator {
    runner: ProcessRunner,
    paths: WorkspacePaths,
    repo_url: String,
    fetch_mode: FetchMode,
    vcs: String,
    generator: String,
    state: BuildState,
}

impl BuildOrchestrator {
    pub fn new(
        runner: ProcessRunner,
        paths: WorkspacePaths,
        repo_url: impl Into<String>,
        fetch_mode: FetchMode,
    ) -> Self {
        Self {
            runner,
            paths,
            repo_url: repo_url.into(),
            fetch_mode,
            vcs: VCS.to_string(),
            generator: GENERATOR.to_string(),
            state: BuildState::Idle,
        }
    }

    /// Use other program names for the VCS client and the generator.
    pub fn with_programs(mut self, vcs: &str, generator: &str) -> Self {
        self.vcs = vcs.to_string();
        self.generator = generator.to_string();
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    /// Warm-up step for pull mode: clone once so each run only pulls.
    /// Nothing to do in clone mode.
    pub async fn prime(&self) -> Result<(), BuildError> {
        if self.fetch_mode == FetchMode::Clone || self.paths.has_checkout() {
            return Ok(());
        }
        info!(event = "checkout.priming", source = %self.paths.source().display());
        self.clone_fresh().await.map(|_| ())
    }

    /// Fetch then generate. On failure the state is `Failed(stage)` and no
    /// later step has run.
    pub async fn run(&mut self) -> Result<(), StageFailure> {
        self.state = BuildState::Fetching;
        obs::emit_stage_started(Stage::Fetch);
        let started = Instant::now();
        let fetched = self.fetch().await;
        self.settle(Stage::Fetch, started, fetched)?;

        self.state = BuildState::Generating;
        obs::emit_stage_started(Stage::Build);
        let started = Instant::now();
        let generated = self.generate().await;
        self.settle(Stage::Build, started, generated)?;

        self.state = BuildState::Done;
        Ok(())
    }

    fn settle(
        &mut self,
        stage: Stage,
        started: Instant,
        result: Result<CommandOutput, BuildError>,
    ) -> Result<(), StageFailure> {
        obs::emit_stage_finished(stage, obs::elapsed_ms(started), result.is_ok());
        result.map(|_| ()).map_err(|error| {
            self.state = BuildState::Failed(stage);
            StageFailure { stage, error }
        })
    }

    /// Bring the checkout up to date according to the fetch mode.
    pub async fn fetch(&self) -> Result<CommandOutput, BuildError> {
        match self.fetch_mode {
            FetchMode::Clone => self.clone_fresh().await,
            FetchMode::Pull => {
                if !self.paths.has_checkout() {
                    return Err(BuildError::MissingCheckout {
                        path: self.paths.source().to_path_buf(),
                    });
                }
                let spec = CommandSpec::new(&self.vcs)
                    .arg("pull")
                    .arg("-v")
                    .current_dir(self.paths.source());
                checked(self.runner.run(&spec).await?)
            }
        }
    }

    /// Generate the site into an emptied output root.
    pub async fn generate(&self) -> Result<CommandOutput, BuildError> {
        self.paths
            .clean_output()
            .map_err(|source| BuildError::Workspace {
                path: self.paths.output().to_path_buf(),
                source,
            })?;
        let spec = CommandSpec::new(&self.generator)
            .arg("--source")
            .arg(self.paths.source())
            .arg("--destination")
            .arg(self.paths.output())
            .current_dir(self.paths.root());
        checked(self.runner.run(&spec).await?)
    }

    async fn clone_fresh(&self) -> Result<CommandOutput, BuildError> {
        self.paths
            .reset_source()
            .map_err(|source| BuildError::Workspace {
                path: self.paths.source().to_path_buf(),
                source,
            })?;
        let spec = CommandSpec::new(&self.vcs)
            .arg("clone")
            .arg("-v")
            .arg(&self.repo_url)
            .arg(self.paths.source())
            .current_dir(self.paths.root());
        checked(self.runner.run(&spec).await?)
    }
}

fn checked(output: CommandOutput) -> Result<CommandOutput, BuildError> {
    if output.success() {
        Ok(output)
    } else {
        Err(BuildError::NonZeroExit {
            command: output.command,
            code: output.exit_code,
            output_tail: tail(&output.output, DIAGNOSTIC_LINES),
        })
    }
}
