use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a launched child process ended, observed by the parent.
///
/// Produced by [`launch`] and consumed immediately to print one status
/// line; never retained across dispatch cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The child terminated normally with the given exit code.
    Exited(i32),
    /// The child was killed by the given signal.
    Signaled(i32),
    /// No child ran to completion: the spawn or exec itself failed.
    SpawnFailed(String),
}

/// Resolve a command name against an ordered list of search directories.
///
/// Behavior:
/// - A command starting with `/` or `.` is already a path (absolute or
///   explicitly relative) and is returned unchanged with no existence or
///   permission checks; a bad explicit path fails later at spawn time.
/// - Otherwise each directory is tried in list order and the first
///   candidate that is an executable regular file wins, even if a later
///   directory also contains a match.
/// - Returns `None` when no directory yields a match.
pub fn resolve_executable(command: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    if command.starts_with(['/', '.']) {
        return Some(PathBuf::from(command));
    }
    for dir in search_path {
        let candidate = dir.join(command);
        if candidate.is_file() && is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Whether the current user may execute `path`.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn is_executable(_path: &Path) -> bool {
    // No execute bit to consult; existence was already checked.
    true
}

/// Spawn `executable` with the given arguments and block until it ends.
///
/// The child inherits the shell's standard streams and runs with the
/// environment's variables and working directory. `argv0` is passed to the
/// program as its own name (the bare command the user typed, not the
/// resolved path), matching what launched programs conventionally expect.
///
/// The parent waits for this specific child only. A failed exec never
/// returns control to the shell loop: the standard library reports it back
/// from `spawn` and the child is gone, which maps to
/// [`ProcessOutcome::SpawnFailed`].
pub fn launch(executable: &Path, argv0: &str, args: &[String], env: &Environment) -> ProcessOutcome {
    let mut command = std::process::Command::new(executable);
    command
        .args(args)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .current_dir(&env.current_dir);
    set_argv0(&mut command, argv0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return ProcessOutcome::SpawnFailed(e.to_string()),
    };

    match child.wait() {
        Ok(status) => classify_status(status),
        Err(e) => ProcessOutcome::SpawnFailed(e.to_string()),
    }
}

#[cfg(unix)]
fn set_argv0(command: &mut std::process::Command, argv0: &str) {
    use std::os::unix::process::CommandExt;
    command.arg0(argv0);
}

#[cfg(not(unix))]
fn set_argv0(_command: &mut std::process::Command, _argv0: &str) {}

#[cfg(unix)]
fn classify_status(status: std::process::ExitStatus) -> ProcessOutcome {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => ProcessOutcome::Exited(code),
        None => match status.signal() {
            Some(signal) => ProcessOutcome::Signaled(signal),
            None => ProcessOutcome::SpawnFailed("child ended in unknown state".to_string()),
        },
    }
}

#[cfg(not(unix))]
fn classify_status(status: std::process::ExitStatus) -> ProcessOutcome {
    ProcessOutcome::Exited(status.code().unwrap_or(-1))
}

/// Command that is not a builtin: resolved against the search path and run
/// as a child process.
pub struct ExternalCommand {
    name: String,
    resolved: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: String, resolved: PathBuf, args: Vec<String>) -> Self {
        Self {
            name,
            resolved,
            args,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let resolved = resolve_executable(name, &env.search_path)?;
        Some(Box::new(ExternalCommand::new(
            name.to_string(),
            resolved,
            args.iter().map(|a| a.to_string()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    /// Launch the resolved program, report how it ended, and fold the
    /// outcome into a shell exit code. None of the outcomes is an `Err`:
    /// a child's failure must never unwind the shell loop.
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match launch(&self.resolved, &self.name, &self.args, env) {
            ProcessOutcome::Exited(code) => {
                writeln!(
                    stdout,
                    "Command '{}' executed successfully with return code {}.",
                    self.name, code
                )?;
                Ok(code)
            }
            ProcessOutcome::Signaled(signal) => {
                writeln!(
                    stdout,
                    "Command '{}' terminated by signal {}.",
                    self.name, signal
                )?;
                Ok(128 + signal)
            }
            ProcessOutcome::SpawnFailed(reason) => {
                writeln!(stdout, "Error executing command: {}", reason)?;
                Ok(127)
            }
        }
    }
}
