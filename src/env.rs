use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Directories consulted, in order, when resolving a bare command name.
///
/// First match wins; the current directory is searched last. The list is
/// fixed at construction rather than taken from `PATH` so that resolution
/// behavior is deterministic and tests can substitute their own list.
pub const DEFAULT_SEARCH_PATH: [&str; 4] = ["/bin/", "/usr/bin/", "/usr/local/bin/", "./"];

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: environment variables made visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `search_path`: ordered directories used to resolve external commands.
/// - `should_exit`: a flag the REPL checks to know when to terminate.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., HOME, TERM).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Ordered list of directories searched for external commands.
    pub search_path: Vec<PathBuf>,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Variables are copied from `std::env::vars()`, `current_dir` from
    /// `std::env::current_dir()`, and `search_path` is initialized to
    /// [`DEFAULT_SEARCH_PATH`]. The `should_exit` flag starts as `false`.
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars() {
            vars.insert(k, v);
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            search_path: DEFAULT_SEARCH_PATH.iter().map(PathBuf::from).collect(),
            should_exit: false,
        }
    }

    /// Replace the search path, keeping everything else. Used by tests and
    /// by embedders that want a different resolution order.
    pub fn with_search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_path = dirs;
        self
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
