//! Integration tests for the `a64` CLI.

use a64_asm as _;
use a64_core as _;
use env_logger as _;
use log as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_a64"))
}

fn create_temp_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn a64(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run a64")
}

const HELLO: &str = r#"// write(1, msg, 3); exit(3)
_start:
    mov x0, #1
    adr x1, msg
    mov x2, #3
    mov x16, #4
    svc #0
    mov x0, #3
    mov x16, #1
    svc #0
msg: .ascii "hi\n"
"#;

const SUM: &str = "\
    mov x0, #0
    mov x1, #10
loop:
    add x0, x0, x1
    subs x1, x1, #1
    b.ne loop
    mov x16, #1
    svc #0
";

#[test]
fn build_simple_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "simple.s", b"nop\nret\n");
    let output = temp_dir.path().join("simple.bin");

    let result = a64(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);

    assert!(result.status.success());
    let binary = fs::read(&output).unwrap();
    assert_eq!(
        binary,
        [0x1F, 0x20, 0x03, 0xD5, 0xC0, 0x03, 0x5F, 0xD6]
    );
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "test.s", b"nop\n");

    let result = a64(&["build", source.to_str().unwrap()]);

    assert!(result.status.success());
    assert!(temp_dir.path().join("test.bin").exists());
}

#[test]
fn build_reports_located_errors() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.s", b"nop\nfrobnicate x0\nb nowhere\n");

    let result = a64(&["build", source.to_str().unwrap()]);

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("bad.s:2: error: unknown mnemonic: frobnicate"),
        "{stderr}"
    );
}

#[test]
fn build_verbose_prints_listing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "verbose.s", b"nop\nret\n");
    let output = temp_dir.path().join("verbose.bin");

    let result = a64(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--verbose",
    ]);

    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("00010000: 1f 20 03 d5"), "{stderr}");
    assert!(stderr.contains("NOP"), "{stderr}");
    assert!(stderr.contains("RET"), "{stderr}");
}

#[test]
fn disasm_prints_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(
        temp_dir.path(),
        "prog.bin",
        &[0xA0, 0x00, 0x80, 0xD2, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x03, 0x5F, 0xD6, 0x41],
    );

    let result = a64(&["disasm", image.to_str().unwrap(), "--base", "0x1000"]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "0x00001000: d28000a0  MOV x0, #5");
    assert_eq!(lines[1], "0x00001004: 00000000  .word 0x00000000 ; ILLEGAL");
    assert_eq!(lines[2], "0x00001008: d65f03c0  RET");
    assert!(lines[3].starts_with("0x0000100c: 41"), "{}", lines[3]);
}

#[test]
fn run_source_writes_and_exits() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.s", HELLO.as_bytes());

    let result = a64(&["run", source.to_str().unwrap()]);

    assert_eq!(String::from_utf8_lossy(&result.stdout), "hi\n");
    assert_eq!(result.status.code(), Some(3));
}

#[test]
fn run_built_image() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "sum.s", SUM.as_bytes());
    let image = temp_dir.path().join("sum.bin");

    let built = a64(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        image.to_str().unwrap(),
    ]);
    assert!(built.status.success());

    let result = a64(&["run", image.to_str().unwrap()]);
    assert_eq!(result.status.code(), Some(55));
}

#[test]
fn run_honours_custom_layout() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "sum.s", SUM.as_bytes());

    let result = a64(&[
        "run",
        source.to_str().unwrap(),
        "--base",
        "0x4000",
        "--memory",
        "0x20000",
    ]);
    assert_eq!(result.status.code(), Some(55));
}

#[test]
fn run_stops_at_step_limit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "spin.s", b"spin: b spin\n");

    let result = a64(&["run", source.to_str().unwrap(), "--max-steps", "100"]);

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("step limit of 100"), "{stderr}");
}

#[test]
fn run_reports_illegal_instructions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "zero.bin", &[0, 0, 0, 0]);

    let result = a64(&["run", image.to_str().unwrap()]);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("error"));
}

#[test]
fn help_lists_commands() {
    let result = a64(&["--help"]);
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("build"));
    assert!(stdout.contains("disasm"));
    assert!(stdout.contains("run"));
}
