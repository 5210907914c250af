//! goslang CLI.
//!
//! Commands:
//! - `gos run <file.json>` - Compile a JSON AST and run it
//! - `gos compile <file.json>` - Print the compiled program

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gos_ast::Node;
use gos_codegen::compile_program;
use gos_vm::heap::DEFAULT_HEAP_BYTES;
use gos_vm::{Program, TraceEvent, Value, Vm, VmConfig, VmError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gos")]
#[command(about = "goslang compiler and virtual machine", long_about = None)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON AST and run it
    Run {
        /// Path to the JSON AST
        file: PathBuf,

        /// Heap size in bytes (multiple of 8)
        #[arg(long, default_value_t = DEFAULT_HEAP_BYTES)]
        heap_bytes: usize,

        /// Abort after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,

        /// Print the executed (goroutine, pc, opcode) sequence to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Print the compiled program without running it
    Compile {
        /// Path to the JSON AST
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            heap_bytes,
            max_steps,
            trace,
        } => cmd_run(
            &file,
            VmConfig {
                heap_bytes,
                max_steps,
                trace,
            },
        ),
        Commands::Compile { file } => cmd_compile(&file),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_ast(path: &Path) -> Result<Node> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Node::from_json(&src).with_context(|| format!("failed to parse AST in {}", path.display()))
}

fn compile_file(path: &Path) -> Result<Program> {
    let ast = load_ast(path)?;
    compile_program(&ast).with_context(|| format!("failed to compile {}", path.display()))
}

/// What a run produced, including the output printed before a failure.
struct RunReport {
    output: Vec<String>,
    trace: Vec<TraceEvent>,
    result: Result<Value, VmError>,
}

fn run_program(program: Program, config: VmConfig) -> Result<RunReport> {
    let mut vm = Vm::with_config(program, config).context("failed to initialize the VM")?;
    let result = vm.run_to_value();
    Ok(RunReport {
        output: vm.take_output(),
        trace: vm.trace().to_vec(),
        result,
    })
}

fn cmd_run(path: &Path, config: VmConfig) -> Result<()> {
    let program = compile_file(path)?;
    let report = run_program(program, config)?;

    for line in &report.output {
        println!("{}", line);
    }
    for event in &report.trace {
        eprintln!("{:>4} {:>5}  {}", event.fiber, event.pc, event.op.mnemonic());
    }
    let value = report.result.context("runtime error")?;
    println!("{}", value);
    Ok(())
}

fn cmd_compile(path: &Path) -> Result<()> {
    let program = compile_file(path)?;
    print!("{}", program);
    Ok(())
}
