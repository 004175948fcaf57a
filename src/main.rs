use pshell::Interpreter;

fn main() -> anyhow::Result<()> {
    Interpreter::default().repl()
}
