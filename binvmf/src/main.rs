//! vmfdiff: parse, re-serialize, and compare Hammer VMF map sources.
//!
//! Usage: vmfdiff [OPTIONS] <COMMAND>
//!
//! Commands:
//!   compare <A> <B>   Structural diff of two maps (exit 1 when they differ)
//!   parse <FILE>      Dump the parsed document, or write it back as canonical VMF
//!   stats <FILE>      Counts of brushes, entities, textures, and so on
//!   check <FILE>...   Exit 0 if every file parses, 1 otherwise
//!
//! Options:
//!   --config <FILE>        TOML parser settings
//!   --max-depth <N>        Maximum block nesting depth
//!   --max-lines <N>        Maximum number of input lines
//!   --merge <POLICY>       Repeated keys: array, last, first
//!   --preserve-comments    Keep `//` comments
//!
//! Diagnostics go to stderr and are filtered by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use libvmf::{
    compare, compare_streaming, generate_report, parse, parse_ignore_list, serialize, MapStats,
    ParseError,
};
use std::path::PathBuf;
use std::process;

mod output;
mod settings;

use output::Format;
use settings::ParserArgs;

/// Exit status when a comparison finds differences.
const EXIT_DIFFERENT: i32 = 1;
/// Exit status for unreadable input, bad options, and other failures.
const EXIT_TROUBLE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "vmfdiff",
    version,
    about = "Parse, re-serialize, and compare Hammer VMF map sources"
)]
struct Cli {
    #[command(flatten)]
    parser: ParserArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two maps structurally
    Compare {
        /// Original map
        first: PathBuf,
        /// Modified map
        second: PathBuf,
        /// Comma-separated glob patterns of paths to skip
        #[arg(short, long)]
        ignore: Option<String>,
        /// Compare section by section without loading whole maps
        #[arg(long)]
        streaming: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a map and print it
    Parse {
        /// Map to parse
        file: PathBuf,
        /// Output format (vmf writes canonical VMF)
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print statistics for one map
    Stats {
        /// Map to inspect
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that maps parse
    Check {
        /// Maps to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("Error: {}", message);
            EXIT_TROUBLE
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> Result<i32, String> {
    let config = cli.parser.resolve()?;
    match &cli.command {
        Commands::Compare {
            first,
            second,
            ignore,
            streaming,
            format,
            output,
        } => {
            let patterns = ignore.as_deref().map(parse_ignore_list).unwrap_or_default();
            let comparison = if *streaming || config.streaming {
                log::info!("Streaming comparison of {} and {}", first.display(), second.display());
                compare_streaming(first, second, &patterns, &config)
            } else {
                let doc1 = parse(first, &config).map_err(describe)?;
                let doc2 = parse(second, &config).map_err(describe)?;
                compare(&doc1, &doc2, &patterns)
            }
            .map_err(|e| match e {
                libvmf::DiffError::Parse(e) => describe(e),
                other => other.to_string(),
            })?;

            let text = match format {
                Format::Text => generate_report(&comparison),
                Format::Vmf => return Err("compare cannot write VMF output".to_string()),
                structured => output::structured(&comparison, *structured)?,
            };
            output::emit(&text, output.as_deref())?;
            Ok(if comparison.differences.is_empty() {
                0
            } else {
                EXIT_DIFFERENT
            })
        }

        Commands::Parse {
            file,
            format,
            output,
        } => {
            let doc = parse(file, &config).map_err(describe)?;
            let text = match format {
                Format::Vmf => serialize(&doc),
                Format::Text => return Err("parse output must be json, yaml, or vmf".to_string()),
                structured => output::structured(&doc, *structured)?,
            };
            output::emit(&text, output.as_deref())?;
            Ok(0)
        }

        Commands::Stats {
            file,
            format,
            output,
        } => {
            let doc = parse(file, &config).map_err(describe)?;
            let stats = MapStats::of(&doc);
            let text = match format {
                Format::Text => output::stats_text(&stats),
                Format::Vmf => return Err("stats cannot write VMF output".to_string()),
                structured => output::structured(&stats, *structured)?,
            };
            output::emit(&text, output.as_deref())?;
            Ok(0)
        }

        Commands::Check { files } => {
            let mut failed = 0;
            for file in files {
                match parse(file, &config) {
                    Ok(_) => println!("{}: ok", file.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}", describe(e));
                    }
                }
            }
            Ok(if failed == 0 { 0 } else { 1 })
        }
    }
}

/// A parse error with the source lines around it, when it has any.
fn describe(err: ParseError) -> String {
    let mut message = err.to_string();
    for line in err.context() {
        message.push('\n');
        message.push_str(line);
    }
    message
}
