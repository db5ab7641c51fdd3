use crate::prelude::*;
use crate::{err, err_ctx, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessError {
    #[error("Failed to spawn `{program}`")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{program}` didn't finish in {timeout:.0?}")]
    Timeout { program: String, timeout: Duration },

    #[error("`{program}` produced malformed output")]
    BadOutput {
        program: String,
        source: serde_json::Error,
    },
}

/// Options for the child process invocation.
#[derive(Default, Clone, Copy)]
pub(crate) struct RunOptions {
    /// The child is killed if it doesn't exit in this time.
    pub(crate) timeout: Option<Duration>,
}

/// Runs the program to completion and returns its stdout. The stderr is
/// captured and becomes the error diagnostic if the program fails.
pub(crate) async fn run(program: &str, args: &[&str], opts: RunOptions) -> Result<Vec<u8>> {
    let display_args = shlex::try_join(args.iter().copied()).fatal_ctx(|| {
        format!("Couldn't run program that contains a nul byte: {program:?} {args:?}")
    })?;

    debug!(cmd = %format_args!("{program} {display_args}"), "Running program");

    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match opts.timeout {
        Some(timeout) => tokio::time::timeout(timeout, output)
            .await
            .map_err(|_| {
                err!(ProcessError::Timeout {
                    program: program.to_owned(),
                    timeout,
                })
            })?,
        None => output.await,
    };

    let output = output.map_err(err_ctx!(ProcessError::Spawn {
        program: program.to_owned()
    }))?;

    let status = output.status;

    if !status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        return Err(err!(ProcessError::NonZeroExit {
            program: program.to_owned(),
            status,
            stderr,
        }));
    }

    Ok(output.stdout)
}

pub(crate) async fn run_json<T: serde::de::DeserializeOwned>(
    program: &str,
    args: &[&str],
    opts: RunOptions,
) -> Result<T> {
    let output = run(program, args, opts).await?;
    serde_json::from_slice(&output).map_err(err_ctx!(ProcessError::BadOutput {
        program: program.to_owned()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use assert_matches::assert_matches;

    #[test_log::test(tokio::test)]
    async fn captures_stdout() {
        let stdout = run("sh", &["-c", "printf hello"], RunOptions::default())
            .await
            .unwrap();
        assert_eq!(stdout, b"hello");
    }

    #[test_log::test(tokio::test)]
    async fn non_zero_exit_carries_stderr() {
        let err = run("sh", &["-c", "echo boom >&2; exit 3"], RunOptions::default())
            .await
            .unwrap_err();

        assert_matches!(
            err.kind(),
            ErrorKind::Process {
                source: ProcessError::NonZeroExit { stderr, .. }
            } if stderr == "boom"
        );
    }

    #[test_log::test(tokio::test)]
    async fn timeout_kills_the_child() {
        let opts = RunOptions {
            timeout: Some(Duration::from_millis(50)),
        };
        let err = run("sleep", &["5"], opts).await.unwrap_err();

        assert_matches!(
            err.kind(),
            ErrorKind::Process {
                source: ProcessError::Timeout { .. }
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn missing_program() {
        let err = run("definitely-not-a-real-program", &[], RunOptions::default())
            .await
            .unwrap_err();

        assert_matches!(
            err.kind(),
            ErrorKind::Process {
                source: ProcessError::Spawn { .. }
            }
        );
    }
}
