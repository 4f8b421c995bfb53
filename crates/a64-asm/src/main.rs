//! CLI entry point for the `a64` assembler, disassembler and runner.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use a64_asm::assembler::{assemble, Assembly};
use a64_asm::parser::parse_numeric_value;
use a64_core::disasm::disassemble_listing;
use a64_core::machine::DEFAULT_BASE_ADDRESS;
use a64_core::{words_from_le_bytes, Machine, MachineConfig, RunStop, INSTRUCTION_BYTES};
use log::debug;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: a64 <command> [options]

Commands:
  build  <source> [-o <output>] [--base <addr>]       Assemble source to a raw image
  disasm <image> [--base <addr>]                      Disassemble a raw image
  run    <image|source> [--max-steps <n>] [--base <addr>] [--memory <bytes>]
                                                      Execute until exit

Options:
  -o, --output <file>  Output file path (default: input stem + .bin)
  --base <addr>        Load address (default: 0x10000)
  --max-steps <n>      Instruction budget for run (default: 1000000)
  --memory <bytes>     Machine memory size for run (default: 0x100000)
  -v, --verbose        Debug logging; build also prints a listing to stderr
  -h, --help           Show this help message

Sources ending in .s, .S or .asm are assembled before running.
System calls (number in x16): 1 exits with x0, 4 writes x2 bytes at x1
to fd x0 (1 = stdout, 2 = stderr).
";

const DEFAULT_MAX_STEPS: u64 = 1_000_000;

const SYSCALL_EXIT: u64 = 1;
const SYSCALL_WRITE: u64 = 4;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildArgs),
    Disasm(DisasmArgs),
    Run(RunArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    base: u64,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DisasmArgs {
    input: PathBuf,
    base: u64,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    input: PathBuf,
    base: u64,
    max_steps: u64,
    memory: Option<u64>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

impl Command {
    const fn verbose(&self) -> bool {
        match self {
            Self::Build(args) => args.verbose,
            Self::Disasm(args) => args.verbose,
            Self::Run(args) => args.verbose,
        }
    }
}

/// Options shared by every command, gathered before the command-specific
/// checks.
#[derive(Debug, Default)]
struct CommonArgs {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    base: Option<u64>,
    max_steps: Option<u64>,
    memory: Option<u64>,
    verbose: bool,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let allowed: &[&str] = match command_str.as_str() {
        "build" => &["-o", "--base"],
        "disasm" => &["--base"],
        "run" => &["--base", "--max-steps", "--memory"],
        other => return Err(format!("unknown command: {other}")),
    };
    let common = parse_common_args(args, allowed)?;
    let input = common
        .input
        .ok_or_else(|| "missing input path".to_string())?;
    let base = common.base.unwrap_or(DEFAULT_BASE_ADDRESS);

    let command = match command_str.as_str() {
        "build" => Command::Build(BuildArgs {
            input,
            output: common.output,
            base,
            verbose: common.verbose,
        }),
        "disasm" => Command::Disasm(DisasmArgs {
            input,
            base,
            verbose: common.verbose,
        }),
        _ => Command::Run(RunArgs {
            input,
            base,
            max_steps: common.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
            memory: common.memory,
            verbose: common.verbose,
        }),
    };
    Ok(ParseResult::Command(command))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_common_args(
    mut args: impl Iterator<Item = OsString>,
    allowed: &[&str],
) -> Result<CommonArgs, String> {
    let mut common = CommonArgs::default();

    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().to_string();

        if text == "--help" || text == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if text == "--verbose" || text == "-v" {
            common.verbose = true;
            continue;
        }

        let flag = if text == "--output" { "-o" } else { text.as_str() };
        if flag.starts_with('-') {
            if !allowed.contains(&flag) {
                return Err(format!("unknown option: {text}"));
            }
            let value = args
                .next()
                .ok_or_else(|| format!("missing value for {text}"))?;
            if flag == "-o" {
                common.output = Some(PathBuf::from(value));
                continue;
            }
            let number = parse_number(&value.to_string_lossy())
                .ok_or_else(|| format!("invalid value for {text}: {}", value.to_string_lossy()))?;
            match flag {
                "--base" => common.base = Some(number),
                "--max-steps" => common.max_steps = Some(number),
                _ => common.memory = Some(number),
            }
            continue;
        }

        if common.input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        common.input = Some(PathBuf::from(arg));
    }

    Ok(common)
}

fn parse_number(text: &str) -> Option<u64> {
    parse_numeric_value(text).and_then(|value| u64::try_from(value).ok())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.bin"))
}

fn is_source_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "s" | "S" | "asm"))
}

fn assemble_or_report(input: &Path, base: u64) -> Result<Assembly, i32> {
    assemble(input, base).map_err(|errors| {
        eprintln!("{}", errors.format_for_stderr());
        1
    })
}

fn run_build(args: BuildArgs) -> Result<(), i32> {
    let assembly = assemble_or_report(&args.input, args.base)?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = fs::write(&output_path, &assembly.image) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        eprint!("{}", assembly.format_listing());
    }

    println!(
        "Assembled {} ({} bytes) -> {}",
        args.input.display(),
        assembly.image.len(),
        output_path.display()
    );

    Ok(())
}

fn read_image(input: &Path) -> Result<Vec<u8>, i32> {
    fs::read(input).map_err(|e| {
        eprintln!("error: failed to read {}: {e}", input.display());
        1
    })
}

fn run_disasm(args: &DisasmArgs) -> Result<(), i32> {
    let bytes = read_image(&args.input)?;
    let whole = bytes.len() - bytes.len() % INSTRUCTION_BYTES;
    let words = words_from_le_bytes(&bytes[..whole]).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    for row in disassemble_listing(args.base, &words) {
        println!("{row}");
    }
    // Trailing data shorter than a word.
    for (address, byte) in ((args.base + whole as u64)..).zip(&bytes[whole..]) {
        println!("{address:#010x}: {byte:02x}        .byte {byte:#04x}");
    }
    Ok(())
}

fn run_program(args: &RunArgs) -> Result<i32, i32> {
    let image = if is_source_path(&args.input) {
        assemble_or_report(&args.input, args.base)?.image
    } else {
        read_image(&args.input)?
    };

    let defaults = MachineConfig::default();
    let config = MachineConfig {
        memory_size: args.memory.unwrap_or(defaults.memory_size),
        base_address: args.base,
        ..defaults
    };
    let mut machine = Machine::new(config)
        .and_then(|mut machine| machine.load_image(&image).map(|()| machine))
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;

    let mut remaining = args.max_steps;
    loop {
        let outcome = machine.run(remaining).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;
        remaining -= outcome.steps;

        let number = match outcome.stop {
            RunStop::Syscall { number } => number,
            RunStop::StepLimit => {
                eprintln!(
                    "error: step limit of {} reached at pc {:#x}",
                    args.max_steps,
                    machine.pc()
                );
                return Err(1);
            }
        };
        debug!("syscall {number} at {:#x}", machine.pc());

        match number {
            #[allow(clippy::cast_possible_truncation)]
            SYSCALL_EXIT => return Ok(machine.x(0) as i32),
            SYSCALL_WRITE => service_write(&mut machine)?,
            other => {
                eprintln!("error: unsupported syscall {other} at pc {:#x}", machine.pc());
                return Err(1);
            }
        }
    }
}

fn service_write(machine: &mut Machine) -> Result<(), i32> {
    let fd = machine.x(0);
    let bytes = machine.bytes(machine.x(1), machine.x(2)).map_err(|e| {
        eprintln!("error: write syscall: {e}");
        1
    })?;

    let written = match fd {
        1 => io::stdout().write_all(bytes),
        2 => io::stderr().write_all(bytes),
        other => {
            eprintln!("error: write syscall: unsupported fd {other}");
            return Err(1);
        }
    };
    if let Err(e) = written {
        eprintln!("error: write syscall: {e}");
        return Err(1);
    }

    let count = bytes.len() as u64;
    machine.set_x(0, count);
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            init_logging(command.verbose());
            let result = match command {
                Command::Build(args) => run_build(args).map(|()| 0),
                Command::Disasm(args) => run_disasm(&args).map(|()| 0),
                Command::Run(args) => run_program(&args),
            };
            result.unwrap_or_else(|code| code)
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    let _ = io::stdout().flush();
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn args(items: &[&str]) -> impl Iterator<Item = OsString> {
        items
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_build_command() {
        let result = parse_args(args(&["build", "prog.s", "-o", "out.bin", "--verbose"]))
            .expect("valid build args should parse");

        let ParseResult::Command(Command::Build(build)) = result else {
            panic!("expected build command");
        };
        assert_eq!(
            build,
            BuildArgs {
                input: PathBuf::from("prog.s"),
                output: Some(PathBuf::from("out.bin")),
                base: DEFAULT_BASE_ADDRESS,
                verbose: true,
            }
        );
    }

    #[test]
    fn parses_run_command_with_numbers() {
        let result = parse_args(args(&[
            "run",
            "prog.bin",
            "--max-steps",
            "500",
            "--base",
            "0x2000",
            "--memory",
            "0x40000",
        ]))
        .expect("valid run args should parse");

        let ParseResult::Command(Command::Run(run)) = result else {
            panic!("expected run command");
        };
        assert_eq!(
            run,
            RunArgs {
                input: PathBuf::from("prog.bin"),
                base: 0x2000,
                max_steps: 500,
                memory: Some(0x40000),
                verbose: false,
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["link"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_options_of_other_commands() {
        let error = parse_args(args(&["disasm", "a.bin", "--max-steps", "5"]))
            .expect_err("disasm takes no step budget");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn rejects_bad_numbers() {
        let error = parse_args(args(&["run", "a.bin", "--base", "zero"]))
            .expect_err("base must be numeric");
        assert!(error.contains("invalid value"));
    }

    #[test]
    fn parse_missing_input() {
        let error = parse_args(args(&["build"])).expect_err("missing input should fail");
        assert!(error.contains("missing input"));
    }

    #[test]
    fn default_output_path_with_dir() {
        let output = default_output_path(Path::new("src/prog.s"));
        assert_eq!(output, PathBuf::from("src/prog.bin"));
    }

    #[test]
    fn source_paths_are_recognised() {
        assert!(is_source_path(Path::new("prog.s")));
        assert!(is_source_path(Path::new("prog.asm")));
        assert!(!is_source_path(Path::new("prog.bin")));
    }
}
