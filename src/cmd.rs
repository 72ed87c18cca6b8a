//! Interpreter-wrapped command execution.
//!
//! Every shell-backed resource funnels its commands through a
//! [`CommandRunner`]: the command string is handed to an interpreter
//! (`/bin/sh -c` by default, `cmd /C` on Windows), run in an explicit
//! working directory, with an explicit environment overlay. Both output
//! streams are streamed line-wise to the log sink while being captured;
//! stdout is what callers get back, the merged stream is kept for failure
//! context. A deadline, when set, kills the child process instead of
//! leaking it.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// How often a deadline-bound child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs interpreter-wrapped commands with an explicit environment.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    interpreter: Vec<String>,
    env: BTreeMap<String, String>,
    deadline: Option<Duration>,
}

impl CommandRunner {
    /// A runner using the platform's default interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interpreter: default_interpreter(),
            env: BTreeMap::new(),
            deadline: None,
        }
    }

    /// Override the interpreter. An empty override keeps the default.
    #[must_use]
    pub fn interpreter(mut self, interpreter: &[String]) -> Self {
        if !interpreter.is_empty() {
            self.interpreter = interpreter.to_vec();
        }
        self
    }

    /// Extend the child's environment with explicit variables.
    #[must_use]
    pub fn env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Kill the child and fail the run after this long.
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run a command, returning its captured stdout with the trailing
    /// newline trimmed.
    ///
    /// # Errors
    ///
    /// Fails when the interpreter cannot be spawned, the deadline expires,
    /// or the command exits nonzero; the error carries the command and the
    /// merged output for diagnosis.
    pub fn run(&self, command: &str, dir: &Path) -> Result<String> {
        let (program, args) = self
            .interpreter
            .split_first()
            .context("empty interpreter")?;

        let mut child = Command::new(program)
            .args(args)
            .arg(command)
            .current_dir(dir)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program} for {command:?}"))?;

        let merged = Arc::new(Mutex::new(String::new()));
        let stdout = child.stdout.take().context("child stdout missing")?;
        let stderr = child.stderr.take().context("child stderr missing")?;
        let out_handle = spawn_reader(stdout, Arc::clone(&merged));
        let err_handle = spawn_reader(stderr, Arc::clone(&merged));

        let status = self.wait(&mut child, command)?;
        let stdout_text = out_handle.join().expect("stdout reader panicked");
        let _ = err_handle.join().expect("stderr reader panicked");

        if !status.success() {
            let merged = merged.lock().expect("merged output poisoned");
            bail!("running {command:?}: {status}\n{merged}");
        }

        Ok(stdout_text.trim_end_matches('\n').to_string())
    }

    /// Wait for the child, enforcing the deadline by killing it.
    fn wait(&self, child: &mut Child, command: &str) -> Result<ExitStatus> {
        let Some(deadline) = self.deadline else {
            return child.wait().context("waiting on child process");
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().context("polling child process")? {
                return Ok(status);
            }
            if started.elapsed() >= deadline {
                child.kill().context("killing timed-out child")?;
                child.wait().context("reaping timed-out child")?;
                bail!("running {command:?}: deadline of {deadline:?} exceeded");
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// The platform's default interpreter wrapping.
#[must_use]
pub fn default_interpreter() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["/bin/sh".to_string(), "-c".to_string()]
    }
}

/// Stream one pipe line-wise into the log sink while capturing it, and
/// append every line to the shared merged buffer.
fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    merged: Arc<Mutex<String>>,
) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut captured = String::new();
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            log::info!(target: "workbench::cmd", "{line}");
            captured.push_str(&line);
            captured.push('\n');
            let mut merged = merged.lock().expect("merged output poisoned");
            merged.push_str(&line);
            merged.push('\n');
        }
        captured
    })
}
