// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Host engine
//!
//! Runs steps directly on the host as child processes, without any
//! container or VM isolation.

use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Engine, File, ProcessState, Spec, Step};
use crate::errors::{RunnerError, RunnerResult};

const CHUNK_SIZE: usize = 8 * 1024;

/// Exit code reported when the process ended without one (signalled)
const SIGNALLED_EXIT_CODE: i32 = 255;

/// Host process engine
#[derive(Debug, Clone, Default)]
pub struct HostEngine;

impl HostEngine {
    /// Create a new host engine
    pub fn new() -> Self {
        Self
    }

    async fn create_dir(file: &File) -> RunnerResult<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(file.mode);
        builder.create(&file.path).await.map_err(|e| {
            error!(path = %file.path.display(), error = %e, "cannot create directory");
            setup_error(&file.path, e)
        })
    }

    async fn write_file(file: &File) -> RunnerResult<()> {
        if let Some(parent) = file.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| setup_error(parent, e))?;
        }
        tokio::fs::write(&file.path, &file.data).await.map_err(|e| {
            error!(path = %file.path.display(), error = %e, "cannot write file");
            setup_error(&file.path, e)
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&file.path, std::fs::Permissions::from_mode(file.mode))
                .await
                .map_err(|e| setup_error(&file.path, e))?;
        }
        Ok(())
    }

    /// Kill and reap the child after cancellation
    async fn kill(mut child: Child, step: &Step) -> RunnerResult<ProcessState> {
        if let Err(e) = child.start_kill() {
            warn!(step.name = %step.name, error = %e, "cannot kill process");
        }
        let _ = child.wait().await;
        debug!(step.name = %step.name, "process killed");
        Err(RunnerError::Cancelled)
    }
}

fn setup_error(path: &Path, e: std::io::Error) -> RunnerError {
    RunnerError::SetupFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

/// Read one chunk from an open pipe; a closed pipe never resolves.
async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

enum Event {
    Cancelled,
    Stdout(std::io::Result<usize>),
    Stderr(std::io::Result<usize>),
}

#[async_trait]
impl Engine for HostEngine {
    async fn setup(&self, spec: &Spec) -> RunnerResult<()> {
        tokio::fs::create_dir_all(&spec.root)
            .await
            .map_err(|e| setup_error(&spec.root, e))?;

        for file in spec.files.iter().filter(|f| f.is_dir) {
            Self::create_dir(file).await?;
        }
        for file in spec.files.iter().filter(|f| !f.is_dir) {
            Self::write_file(file).await?;
        }
        for file in spec.steps.iter().flat_map(|s| s.files.iter()) {
            if file.is_dir {
                Self::create_dir(file).await?;
            } else {
                Self::write_file(file).await?;
            }
        }

        #[cfg(unix)]
        for link in &spec.links {
            if let Some(parent) = link.target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| setup_error(parent, e))?;
            }
            tokio::fs::symlink(&link.source, &link.target)
                .await
                .map_err(|e| setup_error(&link.target, e))?;
        }

        debug!(root = %spec.root.display(), "workspace created");
        Ok(())
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        _spec: &Spec,
        step: &Step,
        output: &mut (dyn Write + Send),
    ) -> RunnerResult<ProcessState> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }

        let program = which::which(&step.command).map_err(|_| RunnerError::CommandNotFound {
            command: step.command.clone(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&step.args)
            .current_dir(&step.working_dir)
            .env_clear()
            .envs(&step.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for secret in &step.secrets {
            cmd.env(&secret.env, secret.value());
        }

        let mut child = cmd.spawn().map_err(|e| RunnerError::SpawnFailed {
            step: step.name.clone(),
            error: e.to_string(),
        })?;
        debug!(step.name = %step.name, process.pid = ?child.id(), "process started");

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = vec![0u8; CHUNK_SIZE];
        let mut err_buf = vec![0u8; CHUNK_SIZE];

        while stdout.is_some() || stderr.is_some() {
            let event = tokio::select! {
                _ = cancel.cancelled() => Event::Cancelled,
                n = read_chunk(&mut stdout, &mut out_buf) => Event::Stdout(n),
                n = read_chunk(&mut stderr, &mut err_buf) => Event::Stderr(n),
            };

            let chunk = match event {
                Event::Cancelled => return Self::kill(child, step).await,
                Event::Stdout(Ok(0)) => {
                    stdout = None;
                    continue;
                }
                Event::Stderr(Ok(0)) => {
                    stderr = None;
                    continue;
                }
                Event::Stdout(Ok(n)) => &out_buf[..n],
                Event::Stderr(Ok(n)) => &err_buf[..n],
                Event::Stdout(Err(e)) => {
                    warn!(step.name = %step.name, error = %e, "error reading stdout");
                    stdout = None;
                    continue;
                }
                Event::Stderr(Err(e)) => {
                    warn!(step.name = %step.name, error = %e, "error reading stderr");
                    stderr = None;
                    continue;
                }
            };

            if let Err(e) = output.write_all(chunk) {
                warn!(step.name = %step.name, error = %e, "cannot write step output");
            }
        }

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let status = match waited {
            None => return Self::kill(child, step).await,
            Some(status) => status.map_err(|e| RunnerError::WaitFailed {
                step: step.name.clone(),
                error: e.to_string(),
            })?,
        };

        let state = ProcessState::exited(status.code().unwrap_or(SIGNALLED_EXIT_CODE));
        debug!(step.name = %step.name, process.exit = state.exit_code, "process finished");
        Ok(state)
    }

    async fn destroy(&self, spec: &Spec) -> RunnerResult<()> {
        match tokio::fs::remove_dir_all(&spec.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
