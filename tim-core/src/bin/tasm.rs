//! # tasm — TIM assembler
//!
//! ```bash
//! tasm program.tasm                 # Codifica para program.tim
//! tasm program.tasm -o out.tim      # Output customizado
//! tasm program.tasm --json          # Programa em JSON no stdout, sem arquivo
//! tasm -d program.tim               # Desmonta
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use colored::*;
use tracing_subscriber::EnvFilter;

use tim_core::bytecode::output_path;
use tim_core::{Program, assemble};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", usage());
        return ExitCode::SUCCESS;
    }

    let Some(input) = input_file(&args) else {
        eprintln!("{}", usage());
        return ExitCode::from(1);
    };

    let result = if has_flag(&args, "-d", "--disassemble") {
        cmd_disassemble(input, &args)
    } else {
        cmd_assemble(input, &args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn usage() -> &'static str {
    r#"tasm — TIM assembler

USAGE:
    tasm [options] <file>

OPTIONS:
    -o, --output <file>   Output file (default: <file> with .tim extension)
    -d, --disassemble     Disassemble a .tim file
        --json            Print the encoded program as JSON instead of writing it
    -v, --verbose         Print the listing after encoding
    -h, --help            Show help"#
}

fn cmd_assemble(input: &Path, args: &[String]) -> Result<()> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let program = assemble(&source).with_context(|| format!("{}", input.display()))?;

    if args.iter().any(|a| a == "--json") {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let output = parse_output(args).unwrap_or_else(|| output_path(input));
    if same_file(input, &output) {
        bail!("refusing to overwrite {} with bytecode", input.display());
    }
    program
        .save(&output)
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!("{} {} -> {}", "✓".green(), input.display(), output.display());
    println!("   Instructions: {}", program.len());
    println!("   Strings:      {}", program.strings().len());
    if let Some(entry) = program.entry_point() {
        println!("   Entry point:  {}", entry);
    }

    if has_flag(args, "-v", "--verbose") {
        println!();
        print!("{}", program.disassemble());
    }

    Ok(())
}

fn cmd_disassemble(input: &Path, args: &[String]) -> Result<()> {
    let program = Program::load(input).with_context(|| format!("cannot load {}", input.display()))?;
    let listing = program.disassemble();

    match parse_output(args) {
        Some(output) if same_file(input, &output) => {
            bail!("refusing to overwrite {} with its listing", input.display());
        }
        Some(output) => {
            fs::write(&output, &listing)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!("{} {} -> {}", "✓".green(), input.display(), output.display());
        }
        None => print!("{}", listing),
    }

    Ok(())
}

fn has_flag(args: &[String], short: &str, long: &str) -> bool {
    args.iter().any(|a| a == short || a == long)
}

/// Primeiro argumento posicional (pulando o valor de `-o`)
fn input_file(args: &[String]) -> Option<&Path> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" || arg == "--output" {
            iter.next();
            continue;
        }
        if !arg.starts_with('-') {
            return Some(Path::new(arg));
        }
    }
    None
}

fn parse_output(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "-o" || a == "--output")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Mesmo caminho, ou o mesmo arquivo por outro caminho
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!(
        (fs::canonicalize(a), fs::canonicalize(b)),
        (Ok(a), Ok(b)) if a == b
    )
}
