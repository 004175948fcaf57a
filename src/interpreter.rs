use crate::command::{CommandFactory, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Read;
use std::process::Stdio;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate — BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The shell's dispatcher and interactive loop.
///
/// The interpreter maintains an [`Environment`] and a list of
/// [`CommandFactory`] objects queried in order to create commands by name:
/// the built-in factories first, then the external-command factory, so a
/// built-in always shadows an external program of the same name. See
/// [`Default`] for the set included out of the box.
///
/// Example
/// ```no_run
/// use pshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("files", &[]).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    /// Run a single command invocation by name with arguments, using the
    /// shell's real standard streams.
    ///
    /// Returns the command's exit code, or an error when no factory
    /// recognizes the name (the command is neither a built-in nor found in
    /// the search path).
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        let stdin = InheritedStdin(std::io::stdin().lock());
        self.run_with_io(name, args, Box::new(stdin), Box::new(std::io::stdout()))
    }

    pub(crate) fn run_with_io(
        &mut self,
        name: &str,
        args: &[&str],
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd.execute(stdin, stdout, &mut self.env);
            }
        }
        Err(anyhow::anyhow!(
            "Error: Command '{}' not found in path.",
            name
        ))
    }

    /// Tokenize one input line on whitespace and dispatch it.
    ///
    /// A blank line produces zero tokens and is skipped silently; the
    /// caller just prompts again.
    pub fn dispatch_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.split_first() {
            None => Ok(0),
            Some((name, args)) => self.run(name, args),
        }
    }

    #[cfg(test)]
    fn dispatch_line_with_io(
        &mut self,
        line: &str,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> anyhow::Result<ExitCode> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.split_first() {
            None => Ok(0),
            Some((name, args)) => self.run_with_io(name, args, stdin, stdout),
        }
    }

    /// The interactive Read-Eval-Print Loop.
    ///
    /// Reads one line at a time with a fixed prompt, dispatches it, and
    /// keeps going until `finish`/`exit` is invoked or the input stream is
    /// exhausted. No command's failure ends the loop; every failure is one
    /// printed line and the next prompt follows.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline("PShell> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.dispatch_line(&line) {
                        println!("{}", e);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Leave the foreground child's signal handling to the
                    // child; the shell itself just prompts again.
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // End of input is an implicit finish, not an error.
                    println!("Exiting shell...");
                    break;
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `files`, `info`, `delete`, `copy`, `make`, `down`,
    ///   `up`, `finish`, `exit`
    /// - the external command launcher, consulted last
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Files>::default()),
            Box::new(Factory::<Info>::default()),
            Box::new(Factory::<Delete>::default()),
            Box::new(Factory::<Copy>::default()),
            Box::new(Factory::<Make>::default()),
            Box::new(Factory::<Down>::default()),
            Box::new(Factory::<Up>::default()),
            Box::new(Factory::<Finish>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

struct InheritedStdin<'a>(std::io::StdinLock<'a>);

impl Read for InheritedStdin<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin<'_> {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{MemReader, MemWriter};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("pshell_interp_{}_{}_{}", tag, std::process::id(), nanos));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn dispatch(interp: &mut Interpreter, line: &str) -> (anyhow::Result<ExitCode>, String) {
        let (writer, collected) = MemWriter::with_handle();
        let res = interp.dispatch_line_with_io(
            line,
            Box::new(MemReader::new(Vec::new())),
            Box::new(writer),
        );
        let out = String::from_utf8(collected.borrow().clone()).unwrap();
        (res, out)
    }

    #[test]
    fn test_blank_line_is_skipped_silently() {
        let mut interp = Interpreter::default();
        let (res, out) = dispatch(&mut interp, "   ");
        assert_eq!(res.unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_command_reports_not_found() {
        let mut interp = Interpreter::default();
        interp.env.search_path.clear();

        let (res, _out) = dispatch(&mut interp, "definitely_missing_cmd");
        let err = res.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: Command 'definitely_missing_cmd' not found in path."
        );
    }

    #[test]
    fn test_builtin_dispatched_before_external() {
        let temp = make_unique_temp_dir("shadow");
        fs::write(temp.join("a.txt"), b"").unwrap();

        let mut interp = Interpreter::default();
        interp.env.current_dir = temp.clone();

        let (res, out) = dispatch(&mut interp, "files");
        assert_eq!(res.unwrap(), 0);
        assert!(out.lines().any(|l| l == "file: a.txt"));

        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn test_finish_sets_exit_flag() {
        let mut interp = Interpreter::default();
        let (res, out) = dispatch(&mut interp, "finish");
        assert_eq!(res.unwrap(), 0);
        assert!(interp.env.should_exit);
        assert_eq!(out, "Exiting shell...\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_command_reports_exit_code() {
        let mut interp = Interpreter::default();
        interp.env.current_dir = std::env::temp_dir();
        let (res, out) = dispatch(&mut interp, "/bin/sh -c true");
        assert_eq!(res.unwrap(), 0);
        assert!(out.contains("return code 0"));
    }

    #[test]
    fn test_bad_explicit_path_fails_at_spawn_and_loop_survives() {
        let mut interp = Interpreter::default();
        interp.env.current_dir = std::env::temp_dir();

        let (res, out) = dispatch(&mut interp, "./no_such_program_here");
        assert_eq!(res.unwrap(), 127);
        assert!(out.contains("Error executing command"));

        // The shell is still usable afterwards.
        let (res, _out) = dispatch(&mut interp, "finish");
        assert_eq!(res.unwrap(), 0);
    }

    #[test]
    fn test_arity_error_never_runs_the_action() {
        let temp = make_unique_temp_dir("arity");
        fs::write(temp.join("keep.txt"), b"x").unwrap();

        let mut interp = Interpreter::default();
        interp.env.current_dir = temp.clone();

        let (res, out) = dispatch(&mut interp, "delete keep.txt surplus");
        assert_eq!(res.unwrap(), 1);
        assert!(out.contains("surplus"));
        assert!(temp.join("keep.txt").exists());

        let _ = fs::remove_dir_all(temp);
    }
}
