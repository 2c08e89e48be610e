use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "oxfragval")]
/// Validation of XML fragments against a RelaxNG grammar and Schematron rules
pub struct Args {
    /// Format of the log lines written to stderr
    ///
    /// The log level is read from the RUST_LOG environment variable and defaults to "warn".
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate XML file(s)
    ///
    /// Exits with status 1 if one of the files is invalid and with status 2 if a file could not be validated at all.
    Validate {
        /// File(s) to validate
        #[arg(required = true, num_args = 1.., value_hint = ValueHint::FilePath)]
        file: Vec<PathBuf>,
        /// Grammar production the root element of the files should match, like "tei:body"
        ///
        /// If not present, the files are validated as whole documents.
        #[arg(short, long)]
        anchor: Option<String>,
        #[command(flatten)]
        grammars: GrammarArgs,
        /// The output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the production names of the RelaxNG grammar, which are the possible anchors
    Productions {
        /// RelaxNG grammar file
        ///
        /// By default, the OXFRAGVAL_RELAXNG environment variable or schema/jlptei.odd.xml.relaxng is used.
        #[arg(long, value_hint = ValueHint::FilePath)]
        relaxng: Option<PathBuf>,
    },
    /// Check that the RelaxNG grammar and the Schematron rules load
    Check {
        #[command(flatten)]
        grammars: GrammarArgs,
    },
}

#[derive(clap::Args)]
pub struct GrammarArgs {
    /// RelaxNG grammar file
    ///
    /// By default, the OXFRAGVAL_RELAXNG environment variable or schema/jlptei.odd.xml.relaxng is used.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub relaxng: Option<PathBuf>,
    /// Schematron rules file
    ///
    /// By default, the OXFRAGVAL_SCHEMATRON environment variable or schema/jlptei.odd.xml.schematron is used.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub schematron: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
