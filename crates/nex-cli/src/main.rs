//! Neon Executor - CLI
//!
//! Runs a compiled Neon module, or prints its disassembly.
//!
//! Exit status is the program's own when it calls `sys$exit`, 0 when it
//! completes, 1 on an unhandled exception and 2 when execution cannot
//! proceed at all.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use nex_core::bytecode::disasm::disassemble;
use nex_core::vm::FileResolver;
use nex_core::{link, BytecodeLoader, NexConfig, NexError, NexResult, Outcome, VirtualMachine};
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

/// Status for errors that stop execution outright
const FATAL_STATUS: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "nex", version)]
#[command(about = "Execute a compiled Neon module")]
struct Cli {
    /// Compiled module image
    module: PathBuf,

    /// Arguments made available to the program through sys$args
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Maximum call depth before StackOverflowException
    #[arg(long)]
    recursion_limit: Option<usize>,

    /// Directory searched first for imported modules
    #[arg(long)]
    library_dir: Option<PathBuf>,

    /// Report assertions as disabled to the program
    #[arg(long)]
    no_assert: bool,

    /// Print the disassembly instead of running
    #[arg(long)]
    disassemble: bool,
}

impl Cli {
    fn config(&self) -> NexConfig {
        let mut config = NexConfig::new();
        if let Some(limit) = self.recursion_limit {
            config.recursion_limit = limit;
        }
        if let Some(dir) = &self.library_dir {
            config.library_dir = dir.clone();
        }
        config.enable_assert = !self.no_assert;
        config
    }

    /// `sys$args`: the module path followed by the program arguments
    fn program_args(&self) -> Vec<String> {
        std::iter::once(self.module.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Logging goes to stderr; `RUST_LOG` overrides the default `warn` filter
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Run the command and return the process exit status
fn execute(cli: &Cli, out: &mut dyn Write, err: &mut dyn Write) -> NexResult<i32> {
    let config = cli.config();
    let path = cli.module.display().to_string();
    let bytes = fs::read(&cli.module).map_err(|source| NexError::Io {
        path: path.clone(),
        source,
    })?;
    let stdio = |source: io::Error| NexError::Io {
        path: "<stdio>".to_string(),
        source,
    };

    if cli.disassemble {
        let image = BytecodeLoader::load(&bytes)?;
        write!(out, "{}", disassemble(&image)?).map_err(stdio)?;
        return Ok(0);
    }

    let resolver = FileResolver::new(&config, &cli.module);
    let modules = link(&bytes, &resolver)?;
    debug!(module = %path, modules = modules.len(), "linked");
    let vm = VirtualMachine::new(config, modules)?;
    let mut vm = nex_host::install(vm, &cli.program_args());

    match vm.run()? {
        Outcome::Completed => Ok(0),
        Outcome::Exited(code) => Ok(code),
        Outcome::Unhandled(exc) => {
            writeln!(err, "Unhandled exception {}", exc).map_err(stdio)?;
            Ok(1)
        }
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let status = match execute(&cli, &mut io::stdout(), &mut io::stderr()) {
        Ok(status) => status,
        Err(e) => {
            error!(module = %cli.module.display(), "execution failed");
            eprintln!("Error: {}", e);
            FATAL_STATUS
        }
    };
    process::exit(status);
}
