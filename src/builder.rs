//! Sanity builds through the external `bioconda-utils` CLI.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::config::FinderConfig;
use crate::error::{FinderError, Result};
use crate::logging;

/// How long output is still collected after a timed out build was killed.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub package: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Anything able to attempt a package build.
pub trait PackageBuilder {
    fn build(&self, package: &str) -> Result<BuildOutcome>;
}

/// The bioconda-recipes checkout that contains `recipes_path`.
pub fn bioconda_root(recipes_path: &Path) -> PathBuf {
    match recipes_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// True when `package` builds successfully. Builder errors count as failure.
pub fn mini_sanity_check(builder: &dyn PackageBuilder, package: &str) -> bool {
    match builder.build(package) {
        Ok(outcome) => outcome.success,
        Err(e) => {
            tracing::warn!(package = package, "Build could not be started: {}", e);
            false
        }
    }
}

/// Runs `bioconda-utils build --force recipes/ config.yml --packages <name>`
/// from the bioconda-recipes root.
pub struct BiocondaUtilsBuilder {
    tool: String,
    root: PathBuf,
    recipes_dir: String,
    build_config: String,
    timeout: Duration,
    verbose: bool,
}

impl BiocondaUtilsBuilder {
    pub fn new(recipes_path: &Path, config: &FinderConfig, verbose: bool) -> Self {
        let recipes_dir = recipes_path
            .file_name()
            .map(|name| format!("{}/", name.to_string_lossy()))
            .unwrap_or_else(|| "recipes/".to_string());

        Self {
            tool: config.build_tool.clone(),
            root: bioconda_root(recipes_path),
            recipes_dir,
            build_config: config.build_config.clone(),
            timeout: config.build_timeout(),
            verbose,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn command_args(&self, package: &str) -> Vec<String> {
        vec![
            "build".to_string(),
            "--force".to_string(),
            self.recipes_dir.clone(),
            self.build_config.clone(),
            "--packages".to_string(),
            package.to_string(),
        ]
    }

    pub fn resolve_tool(&self) -> Result<PathBuf> {
        let candidate = Path::new(&self.tool);
        if candidate.components().count() > 1 {
            if candidate.is_file() {
                return Ok(candidate.to_path_buf());
            }
        } else if let Ok(path) = which::which(&self.tool) {
            return Ok(path);
        }

        Err(FinderError::tool_not_found(
            &self.tool,
            "conda install -c conda-forge -c bioconda bioconda-utils",
        ))
    }
}

impl PackageBuilder for BiocondaUtilsBuilder {
    fn build(&self, package: &str) -> Result<BuildOutcome> {
        let tool = self.resolve_tool()?;
        let args = self.command_args(package);

        if self.verbose {
            eprintln!(
                "Executing in {}: {} {}",
                self.root.display(),
                tool.display(),
                args.join(" ")
            );
        }
        tracing::debug!(tool = %tool.display(), cwd = %self.root.display(), ?args, "Starting build");

        let started = Instant::now();
        let mut command = Command::new(&tool);
        command
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // conda-build and docker run as grandchildren; keep them killable as one group
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| {
                FinderError::io_error(
                    format!("spawn {}", tool.display()),
                    Some(self.root.display().to_string()),
                    e,
                )
            })?;

        // Drain both pipes while waiting so a chatty build cannot block on a full buffer.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let (exit_code, timed_out) = match child.wait_timeout(self.timeout)? {
            Some(status) => (status.code(), false),
            None => {
                kill_build(&mut child);
                tracing::warn!(
                    package = package,
                    "Build timed out after {} seconds",
                    self.timeout.as_secs()
                );
                (None, true)
            }
        };

        let grace = timed_out.then_some(OUTPUT_GRACE);
        let stdout = stdout_reader
            .map(|rx| collect_output(rx, grace))
            .unwrap_or_default();
        let stderr = stderr_reader
            .map(|rx| collect_output(rx, grace))
            .unwrap_or_default();
        let duration = started.elapsed();

        logging::log_build_result(package, exit_code, duration.as_millis() as u64);
        if exit_code != Some(0) {
            for line in stderr.lines().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
                tracing::debug!("[{}] {}", package, line);
            }
        }

        Ok(BuildOutcome {
            package: package.to_string(),
            success: exit_code == Some(0),
            exit_code,
            timed_out,
            stdout,
            stderr,
            duration,
        })
    }
}

/// Kill the build tool together with every process it started.
fn kill_build(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            tracing::debug!("Failed to kill process group {}: {}", child.id(), e);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        let _ = tx.send(String::from_utf8_lossy(&buffer).into_owned());
    });
    rx
}

/// Output of a reader thread. With a `grace` period, a pipe still held open
/// by an escaped process yields an empty string instead of blocking.
fn collect_output(rx: mpsc::Receiver<String>, grace: Option<Duration>) -> String {
    match grace {
        Some(grace) => rx.recv_timeout(grace).unwrap_or_default(),
        None => rx.recv().unwrap_or_default(),
    }
}
