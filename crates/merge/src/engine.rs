use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use mergebot_common::{FileHandle, MergeMode};

/// How the inputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Play the inputs back to back.
    Concat,
    /// Lay the inputs side by side as streams of one container.
    Mux,
}

/// Where and how the merged file is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub mode: MergeMode,
    pub strategy: MergeStrategy,
    pub output: PathBuf,
}

impl TargetSpec {
    /// Target for a job in `mode`, written to `dir/<stem>.<ext>`.
    pub fn for_mode(mode: MergeMode, dir: impl Into<PathBuf>, stem: &str) -> Self {
        let strategy = match mode {
            MergeMode::VideoMerge | MergeMode::AudioMerge => MergeStrategy::Concat,
            MergeMode::MixedMerge => MergeStrategy::Mux,
        };
        let output = dir
            .into()
            .join(format!("{stem}.{}", mode.output_extension()));
        Self {
            mode,
            strategy,
            output,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("merge needs at least two inputs, got {0}")]
    NotEnoughInputs(usize),

    #[error("failed to start merge process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("merge timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("merge process exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("merge process reported success but produced no output")]
    MissingOutput,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// External merge engine: combines ordered inputs into a single file.
///
/// Either the whole merge succeeds and one file is returned, or it fails and
/// no partial output is handed back.
#[async_trait]
pub trait MergeEngine: Send + Sync {
    async fn merge(
        &self,
        inputs: &[FileHandle],
        target: &TargetSpec,
    ) -> Result<FileHandle, EngineError>;
}
