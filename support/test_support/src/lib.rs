use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    Translated,
    FrontendError,
    Unsupported,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    pub enabled: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExpectedOutcome {
    pub c_file: Option<String>,
    pub stdout_file: Option<String>,
    pub error_contains_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    /// Whether CPython must print the same stdout as the compiled C.
    #[serde(default)]
    pub parity: bool,
    pub bench: BenchConfig,
    #[serde(default)]
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn read_program(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading {}", self.program_path.display()))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let program_path = path.join("program.py");
        ensure!(
            program_path.exists(),
            "Missing program.py for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        cases.push(Case {
            name: case_name,
            dir: path,
            program_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

fn required(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn runs(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds a C compiler from `CC` or `cc`. Returns `None` (skip) unless
/// `CC_REQUIRED=1`, in which case a missing compiler is an error.
pub fn detect_c_compiler() -> Result<Option<String>> {
    let candidates = std::env::var("CC")
        .into_iter()
        .chain(["cc".to_string(), "gcc".to_string(), "clang".to_string()]);
    for candidate in candidates {
        if runs(&candidate, &["--version"]) {
            return Ok(Some(candidate));
        }
    }
    if required("CC_REQUIRED") {
        bail!("C compilation required but no compiler found. Set CC or install cc.");
    }
    eprintln!("Skipping compiled C checks: no C compiler found (set CC or install cc).");
    Ok(None)
}

/// Finds a Python interpreter from `PYTHON` or `python3`. Returns `None`
/// (skip) unless `PYTHON_PARITY_REQUIRED=1`.
pub fn detect_python_interpreter() -> Result<Option<String>> {
    let candidates = std::env::var("PYTHON")
        .into_iter()
        .chain(["python3".to_string(), "python".to_string()]);
    for candidate in candidates {
        if runs(&candidate, &["-c", "pass"]) {
            return Ok(Some(candidate));
        }
    }
    if required("PYTHON_PARITY_REQUIRED") {
        bail!("CPython parity required but no interpreter found. Set PYTHON or install python3.");
    }
    eprintln!("Skipping CPython parity checks: no PYTHON env or python3 interpreter found.");
    Ok(None)
}

pub fn run_python_file(interpreter: &str, path: &Path) -> Result<String> {
    let output = Command::new(interpreter)
        .arg(path)
        .output()
        .with_context(|| format!("Running python file {}", path.display()))?;
    ensure!(
        output.status.success(),
        "python failed for {}: {}",
        path.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Writes `source` to a scratch directory and returns the `.c` path and the
/// binary path next to it.
pub fn write_temp_source(source: &str, label: &str) -> Result<(PathBuf, PathBuf)> {
    let mut dir = std::env::temp_dir();
    dir.push("py2c");
    fs::create_dir_all(&dir).context("Creating temp directory")?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let file_stem = format!("{label}_{nanos}");
    let source_path = dir.join(format!("{file_stem}.c"));
    let binary_path = dir.join(format!("{file_stem}.bin"));

    fs::write(&source_path, source).context("Writing C source")?;
    Ok((source_path, binary_path))
}

/// Compiles `source` as C99 with `compiler`, runs the binary, and returns its
/// stdout. Scratch files are removed afterwards.
pub fn compile_and_run_c(compiler: &str, source: &str, label: &str) -> Result<String> {
    let (source_path, binary_path) = write_temp_source(source, label)?;
    let result = compile_and_run_paths(compiler, &source_path, &binary_path);
    let _ = fs::remove_file(&source_path);
    let _ = fs::remove_file(&binary_path);
    result
}

fn compile_and_run_paths(compiler: &str, source_path: &Path, binary_path: &Path) -> Result<String> {
    let compile = Command::new(compiler)
        .arg(source_path)
        .arg("-std=c99")
        .arg("-O2")
        .arg("-o")
        .arg(binary_path)
        .output()
        .context("Running C compiler")?;
    if !compile.status.success() {
        let stderr = String::from_utf8_lossy(&compile.stderr);
        bail!("C compilation failed: {stderr}");
    }

    let output = Command::new(binary_path)
        .output()
        .context("Running compiled program")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Compiled program failed: {stderr}");
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
