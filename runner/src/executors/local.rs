use super::{Executor, ExecutorError};
use crate::{
    config::{ConfigErrors, ExecutorConfig},
    ingest::RunOutput,
};
use std::{
    collections::BTreeMap,
    io::Read,
    os::unix::process::CommandExt,
    path::Path,
    process::{Child, Command, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use nix::{
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use tracing::{debug, error, instrument, trace, warn};
use wait_timeout::ChildExt;

// lines of stdout shown when a command fails
const STDOUT_TAIL: usize = 10;

/// Executor that runs every command on this machine, one at a time
#[derive(Clone, Debug)]
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    /// create a new LocalExecutor instance
    pub fn load(config: &ExecutorConfig) -> Result<Self, ConfigErrors> {
        let shell = match config.parameter.get("shell") {
            Some(value) => match value.as_str() {
                Some(shell) => shell.to_owned(),
                None => {
                    error!("executor.parameter.shell must be a string");
                    return Err(ConfigErrors::InvalidExecutorParameter("shell"));
                }
            },
            None => "sh".to_owned(),
        };

        Ok(Self { shell })
    }

    fn execute(
        &self,
        line: &str,
        environment: &BTreeMap<String, String>,
        current_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, ExecutorError> {
        let start = Instant::now();

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(line)
            .current_dir(current_dir)
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // own process group, so a timeout can take down everything the line started
            .process_group(0)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                command: line.to_owned(),
                source,
            })?;

        // drain both pipes while waiting, a chatty benchmark would block on a full pipe otherwise
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match timeout {
            Some(timeout) => match wait(&mut child, timeout, line)? {
                Some(status) => status,
                None => {
                    warn!(command = line, "Run exceeded timeout of {timeout:?}, killing it");
                    // the group id is the shell's pid, see process_group(0)
                    let group = Pid::from_raw(child.id() as i32);
                    if let Err(error) = killpg(group, Signal::SIGKILL) {
                        error!(error = ?error, "Failed to kill timed out run");
                        let _ = child.kill();
                    }
                    let _ = child.wait();

                    return Err(ExecutorError::Timeout {
                        command: line.to_owned(),
                        timeout,
                    });
                }
            },
            None => child.wait().map_err(|source| ExecutorError::Wait {
                command: line.to_owned(),
                source,
            })?,
        };

        let output = RunOutput {
            runtime: start.elapsed(),
            stdout: collect(stdout),
            stderr: collect(stderr),
            status: status.code().unwrap_or(-1),
        };

        debug!(
            "Finished in {} ns | status: {}",
            output.runtime.as_nanos(),
            status.success()
        );
        trace!("Output: {}", output.stdout);

        if status.success() {
            Ok(output)
        } else {
            error!(
                command = line,
                status = output.status,
                "Command failed\n--- stderr ---\n{}\n--- stdout (last {STDOUT_TAIL} lines) ---\n{}",
                output.stderr.trim_end(),
                tail(&output.stdout, STDOUT_TAIL)
            );
            Err(ExecutorError::Failed {
                command: line.to_owned(),
                status: output.status,
                stderr: output.stderr,
            })
        }
    }
}

impl Executor for LocalExecutor {
    #[instrument(skip(self), level = "info")]
    fn shell(&self, command: &str, current_dir: &Path) -> Result<RunOutput, ExecutorError> {
        self.execute(command, &BTreeMap::new(), current_dir, None)
    }

    #[instrument(skip(self, environment), level = "debug")]
    fn run_bench_command(
        &self,
        run_command: &[String],
        environment: &BTreeMap<String, String>,
        current_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<RunOutput, ExecutorError> {
        self.execute(&run_command.join(" "), environment, current_dir, timeout)
    }
}

fn wait(
    child: &mut Child,
    timeout: Duration,
    line: &str,
) -> Result<Option<std::process::ExitStatus>, ExecutorError> {
    child
        .wait_timeout(timeout)
        .map_err(|source| ExecutorError::Wait {
            command: line.to_owned(),
            source,
        })
}

// benchmarks may print arbitrary bytes, only the last line has to be text
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Err(error) = pipe.read_to_end(&mut buffer) {
                warn!(error = ?error, "Failed to read output pipe");
            }
            buffer
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// last `count` lines of `output`
fn tail(output: &str, count: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
