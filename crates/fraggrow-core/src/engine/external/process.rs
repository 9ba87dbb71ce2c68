use std::ffi::OsString;
use std::fs::OpenOptions;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' exited with {}", describe_exit(.code))]
    Failed { program: String, code: Option<i32> },
    #[error("'{program}' did not finish within {after:?} and was killed")]
    TimedOut { program: String, after: Duration },
    #[error("Failed to start async runtime: {0}")]
    Runtime(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "a signal".to_string(),
    }
}

/// A blocking invocation of an external program with an explicit working
/// directory, optional output log and optional deadline.
///
/// The child is killed when the deadline passes or when the waiting future is
/// dropped, so at most one child per command is ever alive.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            log_file: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `--<name> <value>`.
    pub fn named(self, name: &str, value: impl Into<OsString>) -> Self {
        self.arg(format!("--{}", name)).arg(value)
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Appends stdout and stderr of the child to `path`.
    pub fn log_file(mut self, path: &Path) -> Self {
        self.log_file = Some(path.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn argv(&self) -> &[OsString] {
        &self.args
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub async fn run_async(&self) -> Result<(), ProcessError> {
        let program = self.program.to_string_lossy().to_string();
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        match &self.log_file {
            Some(path) => {
                let io_err = |e| ProcessError::Io {
                    program: program.clone(),
                    source: e,
                };
                let out = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(io_err)?;
                let err = out.try_clone().map_err(io_err)?;
                cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        debug!(command = %self.command_line(), "Launching external process");
        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            program: program.clone(),
            source: e,
        })?;

        let status: std::io::Result<ExitStatus> = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(program = %program, ?limit, "External process timed out, killing it");
                        let _ = child.kill().await;
                        return Err(ProcessError::TimedOut {
                            program,
                            after: limit,
                        });
                    }
                }
            }
            None => child.wait().await,
        };

        let status = status.map_err(|e| ProcessError::Io {
            program: program.clone(),
            source: e,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Failed {
                program,
                code: status.code(),
            })
        }
    }

    /// Runs the command to completion, blocking the calling thread.
    pub fn run(&self) -> Result<(), ProcessError> {
        block_on(self.run_async())?
    }
}

/// Drives `future` to completion from synchronous code, whether or not the
/// caller is already inside a tokio runtime.
pub fn block_on<F>(future: F) -> Result<F::Output, ProcessError>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| Ok(current_thread_runtime()?.block_on(future)))
                .join()
                .map_err(|_| ProcessError::Runtime("runtime thread panicked".to_string()))?
        }),
        Err(_) => Ok(current_thread_runtime()?.block_on(future)),
    }
}

fn current_thread_runtime() -> Result<tokio::runtime::Runtime, ProcessError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ProcessError::Runtime(e.to_string()))
}
