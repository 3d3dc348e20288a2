//! File and stream plumbing around the translator.
//!
//! Inputs are read in full before translation starts and outputs are written
//! only after it succeeds, so a failed translation never leaves a partial
//! output file behind.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::translator::Translator;

/// Reads the whole input; `None` or `-` means stdin.
pub fn read_source(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
        }
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading stdin")?;
            Ok(buffer)
        }
    }
}

/// Writes the whole output; `None` means stdout.
pub fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Writing {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("Writing stdout")?;
            stdout.flush().context("Flushing stdout")
        }
    }
}

pub fn translate_file(input: &Path, output: &Path, translator: &Translator) -> Result<()> {
    let source = read_source(Some(input))?;
    let c_source = translator
        .translate_source(&source)
        .with_context(|| format!("Translating {}", input.display()))?;
    write_output(Some(output), &c_source)?;
    info!("translation complete: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("py2c_{label}_{nanos}"));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn translates_file_to_file() {
        let dir = scratch_dir("ok");
        let input = dir.join("program.py");
        let output = dir.join("program.c");
        fs::write(&input, "x = 5\nprint(x)\n").expect("write input");

        translate_file(&input, &output, &Translator::default()).expect("translate_file");

        let c_source = fs::read_to_string(&output).expect("read output");
        assert!(c_source.contains("    x = 5;\n"));
        assert!(c_source.contains("    printf(\"%d\\n\", x);\n"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn failed_translation_writes_nothing() {
        let dir = scratch_dir("err");
        let input = dir.join("program.py");
        let output = dir.join("program.c");
        fs::write(&input, "x = 5\nundefined(x)\n").expect("write input");

        let err = translate_file(&input, &output, &Translator::default())
            .expect_err("expected failure");

        assert!(format!("{err:#}").contains("Unsupported call to `undefined` at line 2"));
        assert!(!output.exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_input_reports_path() {
        let dir = scratch_dir("missing");
        let input = dir.join("absent.py");
        let err = translate_file(&input, &dir.join("out.c"), &Translator::default())
            .expect_err("expected failure");
        assert!(err.to_string().contains("absent.py"));
        fs::remove_dir_all(dir).ok();
    }
}
