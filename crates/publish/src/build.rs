//! Build acquisition.
//!
//! Exactly one strategy runs per invocation and yields the directory
//! the orchestrator ingests. The build itself is a black box.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use umcdeploy_content_store::{BoxFuture, is_non_empty_dir};

use crate::error::BuildError;

/// How the build directory is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Reuse an existing build, building only when it is missing.
    ReuseOrBuild,
    /// Always rebuild.
    Force,
    /// Never build; the directory must already exist.
    Skip,
}

impl BuildStrategy {
    /// Maps CLI flags to a strategy. `skip_build` wins over `build`.
    pub fn from_flags(build: bool, skip_build: bool) -> Self {
        if skip_build {
            Self::Skip
        } else if build {
            Self::Force
        } else {
            Self::ReuseOrBuild
        }
    }
}

/// Produces the static build.
pub trait BuildProducer: Send + Sync {
    fn build(&self) -> BoxFuture<'_, Result<(), BuildError>>;
}

/// Runs a shell-free command such as `npm run build` in a project root.
#[derive(Debug, Clone)]
pub struct CommandBuild {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandBuild {
    /// Splits `command` on whitespace; the first word is the program.
    pub fn new(command: &str, cwd: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let mut words = command.split_whitespace().map(String::from);
        let program = words.next().ok_or(BuildError::InvalidCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
            cwd: cwd.into(),
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl BuildProducer for CommandBuild {
    fn build(&self) -> BoxFuture<'_, Result<(), BuildError>> {
        Box::pin(async move {
            let command = self.display();
            info!(command = %command, cwd = %self.cwd.display(), "building project");

            // Output is inherited so the build's own progress stays visible.
            let status = tokio::process::Command::new(&self.program)
                .args(&self.args)
                .current_dir(&self.cwd)
                .status()
                .await
                .map_err(|source| BuildError::Spawn {
                    command: command.clone(),
                    source,
                })?;

            if !status.success() {
                return Err(BuildError::Failed {
                    command,
                    status: status.to_string(),
                });
            }

            info!("project built successfully");
            Ok(())
        })
    }
}

/// Runs `strategy` and returns the directory to publish.
pub async fn acquire_build(
    strategy: BuildStrategy,
    producer: &dyn BuildProducer,
    dist: &Path,
) -> Result<PathBuf, BuildError> {
    match strategy {
        BuildStrategy::Skip => {
            warn!("skipping build step");
            if !dist.is_dir() {
                return Err(BuildError::Missing {
                    path: dist.to_path_buf(),
                });
            }
        }
        BuildStrategy::Force => producer.build().await?,
        BuildStrategy::ReuseOrBuild => {
            if is_non_empty_dir(dist) {
                info!(path = %dist.display(), "using existing build");
            } else {
                warn!(path = %dist.display(), "no build found, building project");
                producer.build().await?;
            }
        }
    }

    if !dist.is_dir() {
        return Err(BuildError::Missing {
            path: dist.to_path_buf(),
        });
    }
    Ok(dist.to_path_buf())
}
