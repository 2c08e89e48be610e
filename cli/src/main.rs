#![allow(clippy::print_stderr)]
use crate::cli::{Args, Command, GrammarArgs, LogFormat, OutputFormat};
use anyhow::Context;
use clap::Parser;
use oxfragval::{GrammarStore, ValidationResult, ValidatorConfig};
use oxrng::Grammar;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

/// Exit status when at least one file is invalid.
const INVALID: u8 = 1;
/// Exit status when a file or a grammar could not be processed.
const FAILURE: u8 = 2;

pub fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_format);
    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(FAILURE)
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Validate {
            file,
            anchor,
            grammars,
            format,
        } => {
            let store = GrammarStore::open(&grammars.config())?;
            let mut reports = Vec::with_capacity(file.len());
            for path in &file {
                let result = store
                    .validate_file(path, anchor.as_deref())
                    .with_context(|| format!("Failed to validate {}", path.display()))?;
                info!(
                    "{}: {} diagnostics",
                    path.display(),
                    result.diagnostics().len()
                );
                reports.push(FileReport {
                    file: path.as_path(),
                    result,
                });
            }
            let mut stdout = io::stdout().lock();
            match format {
                OutputFormat::Text => {
                    for report in &reports {
                        write_text(&mut stdout, report)?;
                    }
                }
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut stdout, &reports)?;
                    writeln!(stdout)?;
                }
            }
            stdout.flush()?;
            Ok(if reports.iter().all(|r| r.result.is_valid()) {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(INVALID)
            })
        }
        Command::Productions { relaxng } => {
            let mut config = ValidatorConfig::from_env();
            if let Some(relaxng) = relaxng {
                config = config.with_relaxng_path(relaxng);
            }
            let grammar = load_grammar(config.relaxng_path())?;
            let mut stdout = io::stdout().lock();
            for name in grammar.production_names() {
                writeln!(stdout, "{name}")?;
            }
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { grammars } => {
            let config = grammars.config();
            let store = GrammarStore::open(&config)?;
            let mut stdout = io::stdout().lock();
            writeln!(
                stdout,
                "{}: {} productions",
                config.relaxng_path().display(),
                store.grammar().len()
            )?;
            writeln!(
                stdout,
                "{}: {}",
                config.schematron_path().display(),
                if store.rule_grammar().is_empty() {
                    "no rules"
                } else {
                    "ok"
                }
            )?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

impl GrammarArgs {
    /// The environment configuration overridden by the command line paths.
    fn config(&self) -> ValidatorConfig {
        let mut config = ValidatorConfig::from_env();
        if let Some(relaxng) = &self.relaxng {
            config = config.with_relaxng_path(relaxng);
        }
        if let Some(schematron) = &self.schematron {
            config = config.with_schematron_path(schematron);
        }
        config
    }
}

fn load_grammar(path: &Path) -> anyhow::Result<Grammar> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read the grammar {}", path.display()))?;
    Grammar::parse(&text).with_context(|| format!("Failed to load the grammar {}", path.display()))
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: &'a Path,
    #[serde(flatten)]
    result: ValidationResult,
}

fn write_text(output: &mut impl Write, report: &FileReport<'_>) -> io::Result<()> {
    writeln!(
        output,
        "{}: {}",
        report.file.display(),
        report.result.explanation()
    )?;
    for diagnostic in report.result.diagnostics() {
        write!(
            output,
            "  {} ({}) {}",
            diagnostic.severity(),
            diagnostic.kind().source(),
            diagnostic.location()
        )?;
        if let Some(position) = diagnostic.location().position() {
            write!(output, " at {}:{}", position.line, position.column)?;
        }
        writeln!(output, ": {}", diagnostic.message())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_report() -> anyhow::Result<()> {
        let store = GrammarStore::from_sources(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
              <start><element name="body"><zeroOrMore><element name="p"><text/></element></zeroOrMore></element></start>
            </grammar>"#,
            r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron"/>"#,
        )?;
        let result = store.validate_document("<body>\n  <head/>\n</body>")?;
        let mut output = Vec::new();
        write_text(
            &mut output,
            &FileReport {
                file: Path::new("a.xml"),
                result,
            },
        )?;
        assert_eq!(
            String::from_utf8(output)?,
            "a.xml: the fragment is invalid: 1 structural violation\n  Violation (structural) /body[1]/head[1] at 2:3: element \"head\" not allowed here; expected element \"p\"\n"
        );
        Ok(())
    }
}
