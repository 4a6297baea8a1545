//! Merge engine backed by an `ffmpeg` child process.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::process::Command,
    tracing::{debug, info, warn},
};

use mergebot_common::FileHandle;

use crate::engine::{EngineError, MergeEngine, MergeStrategy, TargetSpec};

const CONCAT_LIST_NAME: &str = "inputs.txt";
const STDERR_TAIL_BYTES: usize = 2 * 1024;

pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(3600),
        }
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }
}

/// One line of an ffmpeg concat list. Single quotes inside the path are
/// closed, escaped and reopened.
fn concat_line(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{escaped}'\n")
}

fn concat_list(inputs: &[PathBuf]) -> String {
    inputs.iter().map(|p| concat_line(p)).collect()
}

/// Command line for a merge. `list` is only read for [`MergeStrategy::Concat`].
fn build_args(inputs: &[PathBuf], target: &TargetSpec, list: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];
    match target.strategy {
        MergeStrategy::Concat => {
            args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
            args.push(list.into());
            args.extend(["-map", "0"].map(OsString::from));
        },
        MergeStrategy::Mux => {
            for input in inputs {
                args.push("-i".into());
                args.push(input.into());
            }
            for n in 0..inputs.len() {
                args.push("-map".into());
                args.push(n.to_string().into());
            }
        },
    }
    args.extend(["-c", "copy"].map(OsString::from));
    args.push(target.output.as_os_str().to_owned());
    args
}

/// Last few KiB of stderr, which is where ffmpeg puts the actual error.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[async_trait]
impl MergeEngine for FfmpegEngine {
    async fn merge(
        &self,
        inputs: &[FileHandle],
        target: &TargetSpec,
    ) -> Result<FileHandle, EngineError> {
        if inputs.len() < 2 {
            return Err(EngineError::NotEnoughInputs(inputs.len()));
        }
        let work_dir = target
            .output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| EngineError::io("create output directory", e))?;

        // The concat demuxer resolves relative entries against the list file,
        // so every input goes in as an absolute path.
        let mut absolute = Vec::with_capacity(inputs.len());
        for input in inputs {
            let path = tokio::fs::canonicalize(input.path()).await.map_err(|e| {
                EngineError::io(format!("locate input {}", input.path().display()), e)
            })?;
            absolute.push(path);
        }

        let list = work_dir.join(CONCAT_LIST_NAME);
        if target.strategy == MergeStrategy::Concat {
            tokio::fs::write(&list, concat_list(&absolute))
                .await
                .map_err(|e| EngineError::io("write concat list", e))?;
        }

        let args = build_args(&absolute, target, &list);
        debug!(
            ffmpeg = %self.ffmpeg_path.display(),
            ?args,
            timeout_secs = self.timeout.as_secs(),
            "starting ffmpeg"
        );

        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(EngineError::io("wait for ffmpeg", e)),
            Err(_) => {
                warn!(
                    output = %target.output.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "ffmpeg timed out"
                );
                return Err(EngineError::Timeout(self.timeout));
            },
        };

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "ffmpeg failed");
            let _ = tokio::fs::remove_file(&target.output).await;
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        match tokio::fs::metadata(&target.output).await {
            Ok(meta) if meta.len() > 0 => {
                info!(
                    output = %target.output.display(),
                    size = meta.len(),
                    inputs = inputs.len(),
                    "ffmpeg merge finished"
                );
                Ok(FileHandle::new(&target.output))
            },
            _ => Err(EngineError::MissingOutput),
        }
    }
}
