use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::external::is_executable;
use crate::interpreter::Factory;
use anyhow::{anyhow, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child. Argument counts are
/// enforced uniformly by `FromArgs` before a handler body ever runs: an
/// extra token or a missing positional argument is rejected with a
/// diagnostic naming it, and the action is never attempted.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "files" or "down".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                // Every builtin failure is one human-readable line; it never
                // propagates out of the dispatch loop.
                writeln!(stdout, "{}", e)?;
                Ok(1)
            }
        }
    }
}

/// Shared fallback for arity and flag errors: prints the diagnostic argh
/// produced and refuses to run the handler's action.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// Interpret a user-supplied path relative to the environment's working
/// directory, leaving absolute paths alone.
fn resolve_in(env: &Environment, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        env.current_dir.join(p)
    }
}

#[derive(FromArgs)]
/// List the entries of the current working directory, marking each as a
/// directory or a plain file.
pub struct Files {}

impl BuiltinCommand for Files {
    fn name() -> &'static str {
        "files"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let entries =
            fs::read_dir(&env.current_dir).map_err(|e| anyhow!("Error listing files: {}", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| anyhow!("Error listing files: {}", e))?;
            let kind = if entry.path().is_dir() { "dir" } else { "file" };
            writeln!(stdout, "{}: {}", kind, entry.file_name().to_string_lossy())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Report a path's type, owner, last-modification time, and (for plain
/// files) size and executable bit.
pub struct Info {
    #[argh(positional)]
    /// file or directory to inspect.
    pub path: String,
}

impl BuiltinCommand for Info {
    fn name() -> &'static str {
        "info"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = resolve_in(env, &self.path);
        if !target.exists() {
            return Err(anyhow!("Error: {} does not exist.", self.path));
        }

        let meta =
            fs::metadata(&target).map_err(|e| anyhow!("Error getting info: {}", e))?;
        let is_dir = meta.is_dir();
        let owner = owner_name(&meta)
            .ok_or_else(|| anyhow!("Error getting info: could not look up owner of {}", self.path))?;

        writeln!(stdout, "File Name: {}", self.path)?;
        writeln!(stdout, "Type: {}", if is_dir { "directory" } else { "file" })?;
        writeln!(stdout, "Owner: {}", owner)?;
        writeln!(stdout, "Last Edited: {}", format_mtime(&meta))?;
        if !is_dir {
            writeln!(stdout, "Size (bytes): {}", meta.len())?;
            writeln!(stdout, "Executable?: {}", is_executable(&target))?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove the named file.
pub struct Delete {
    #[argh(positional)]
    /// file to remove.
    pub path: String,
}

impl BuiltinCommand for Delete {
    fn name() -> &'static str {
        "delete"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = resolve_in(env, &self.path);
        if !target.exists() {
            return Err(anyhow!("Error: {} does not exist.", self.path));
        }
        fs::remove_file(&target).map_err(|e| anyhow!("Error deleting file: {}", e))?;
        writeln!(stdout, "Successfully deleted {}", self.path)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Duplicate a file's bytes into a new file. Refuses to overwrite.
pub struct Copy {
    #[argh(positional)]
    /// file to copy from.
    pub source: String,

    #[argh(positional)]
    /// new file to copy to; must not already exist.
    pub destination: String,
}

impl BuiltinCommand for Copy {
    fn name() -> &'static str {
        "copy"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let src = resolve_in(env, &self.source);
        let dst = resolve_in(env, &self.destination);
        if !src.exists() {
            return Err(anyhow!("Error: {} does not exist.", self.source));
        }
        if dst.exists() {
            return Err(anyhow!("Error: {} already exists.", self.destination));
        }
        fs::copy(&src, &dst).map_err(|e| anyhow!("Error copying file: {}", e))?;
        writeln!(
            stdout,
            "Successfully copied {} to {}",
            self.source, self.destination
        )?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create a new empty file. Refuses an existing name.
pub struct Make {
    #[argh(positional)]
    /// name of the file to create.
    pub name: String,
}

impl BuiltinCommand for Make {
    fn name() -> &'static str {
        "make"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = resolve_in(env, &self.name);
        if target.exists() {
            return Err(anyhow!("Error: {} already exists.", self.name));
        }
        // Handle is dropped at end of scope; nothing stays open.
        fs::File::create(&target).map_err(|e| anyhow!("Error creating file: {}", e))?;
        writeln!(stdout, "Successfully created {}", self.name)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory to the named directory.
pub struct Down {
    #[argh(positional)]
    /// directory to descend into.
    pub dir: String,
}

impl BuiltinCommand for Down {
    fn name() -> &'static str {
        "down"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = resolve_in(env, &self.dir);
        if !target.is_dir() {
            return Err(anyhow!("Error: {} does not exist.", self.dir));
        }

        let canonical = fs::canonicalize(&target)
            .map_err(|e| anyhow!("Error changing directory: {}", e))?;
        env::set_current_dir(&canonical)
            .map_err(|e| anyhow!("Error changing directory: {}", e))?;
        env.current_dir = canonical;
        writeln!(stdout, "Changed to directory {}", self.dir)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory to its parent.
pub struct Up {}

impl BuiltinCommand for Up {
    fn name() -> &'static str {
        "up"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        // The parent of the root is the root itself.
        let parent = env
            .current_dir
            .parent()
            .unwrap_or(&env.current_dir)
            .to_path_buf();
        env::set_current_dir(&parent)
            .map_err(|e| anyhow!("Error changing to parent directory: {}", e))?;
        env.current_dir = parent;
        writeln!(stdout, "Changed to parent directory")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print a farewell and stop the shell loop.
pub struct Finish {}

impl BuiltinCommand for Finish {
    fn name() -> &'static str {
        "finish"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "Exiting shell...")?;
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Alias of finish.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        Finish {}.execute(stdin, stdout, env)
    }
}

#[cfg(unix)]
fn owner_name(meta: &fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    // getpwuid is fine here: the shell is single-threaded.
    let pw = unsafe { libc::getpwuid(meta.uid()) };
    if pw.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr((*pw).pw_name) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn owner_name(_meta: &fs::Metadata) -> Option<String> {
    None
}

#[cfg(unix)]
fn format_mtime(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let secs = meta.mtime() as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::localtime_r(&secs, &mut tm);
    }
    format!(
        "{} {} {:2} {:02}:{:02}:{:02} {}",
        DAYS[(tm.tm_wday as usize).min(6)],
        MONTHS[(tm.tm_mon as usize).min(11)],
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
        1900 + tm.tm_year
    )
}

#[cfg(not(unix))]
fn format_mtime(meta: &fs::Metadata) -> String {
    use std::time::UNIX_EPOCH;
    match meta.modified().ok().and_then(|t| t.duration_since(UNIX_EPOCH).ok()) {
        Some(d) => format!("{} seconds since epoch", d.as_secs()),
        None => "unknown".to_string(),
    }
}
