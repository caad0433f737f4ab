//! `cmips <input> -o <output> [-O0|-O1] [--emit-dot <path>]` (spec §6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cmips::driver::{self, CompileOptions, OptLevel};
use cmips::error::CompileError;

#[derive(Parser)]
#[command(name = "cmips", about = "A compiler for a C-like imperative language, targeting MIPS32")]
struct Args {
  /// Source file to compile.
  input: PathBuf,
  /// Output assembly file.
  #[arg(short = 'o', long = "output", default_value = "a.s")]
  output: PathBuf,
  /// Optimization level: 0 disables constant folding, 1 enables it.
  #[arg(short = 'O', default_value_t = 0)]
  opt_level: u8,
  /// Dump the parse tree/AST instead of compiling (an external collaborator's
  /// feature; this binary does not implement a dot writer).
  #[arg(long = "emit-dot")]
  emit_dot: Option<PathBuf>,
}

fn main() -> ExitCode {
  env_logger::init();
  let args = Args::parse();
  let opts = CompileOptions {
    output: args.output,
    opt_level: if args.opt_level >= 1 { OptLevel::O1 } else { OptLevel::O0 },
    emit_dot: args.emit_dot,
  };

  match driver::run(&args.input, &opts) {
    Ok(()) => ExitCode::SUCCESS,
    Err(CompileError::Semantic(n)) => {
      eprintln!("cmips: compilation failed with {n} error(s)");
      ExitCode::from(1)
    }
    Err(err) => {
      eprintln!("cmips: {err}");
      ExitCode::from(2)
    }
  }
}
