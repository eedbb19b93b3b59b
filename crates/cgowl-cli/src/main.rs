//! CGOWL CLI
//!
//! Converts compositional-grammar expressions to OWL:
//! - `annotations`: expressions found in the comments of an ICD-11 export
//! - `tsv`: one expression per table row, with an optional equivalence map
//! - `expr`: a single expression, as the interactive service would
//! - `formats`: registered output formats

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cgowl")]
#[command(author, version, about = "Compositional grammar to OWL converter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the grammar converter listens. Flags win over
/// `CGOWL_GATEWAY_HOST` / `CGOWL_GATEWAY_PORT` / `CGOWL_GATEWAY_TIMEOUT_SECS`.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Converter host
    #[arg(long)]
    host: Option<String>,
    /// Converter gateway port
    #[arg(short, long)]
    port: Option<u16>,
    /// Connect/read/write timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the expressions embedded in annotation comments.
    ///
    /// Every statement of the input is copied to the output; converted
    /// definitions are merged in.
    Annotations {
        /// Input ontology (Turtle, N-Triples or RDF/XML)
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Input syntax when the extension does not say
        #[arg(long)]
        input_format: Option<String>,
        /// Definitions are fully defined (equivalentClass) rather than primitive
        #[arg(short = 'f', long)]
        fully_defined: bool,
        /// Shorten URIs for readability
        #[arg(short = 's', long)]
        short_uris: bool,
        /// Remove SNOMED CT class declarations and labels
        #[arg(short = 'r', long)]
        remove_artifacts: bool,
        /// Output format (see `cgowl formats`)
        #[arg(long, default_value = "turtle")]
        format: String,
        /// Write a JSON run report
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Convert a tab-separated expression table.
    Tsv {
        /// Table with icd11, icdrubric, expression and maptype columns
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Output format (see `cgowl formats`)
        #[arg(long, default_value = "n3")]
        format: String,
        /// Equivalence map to extend; written to `<map-file>upd.ttl`
        #[arg(short, long)]
        map_file: Option<PathBuf>,
        /// Write a JSON run report
        #[arg(long)]
        report: Option<PathBuf>,
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// Convert one expression and print the result.
    Expr {
        /// The expression
        expression: String,
        /// Subject: absolute IRI, prefix:local, or a WHO entity number
        #[arg(long)]
        subject: String,
        /// Primitive (subClassOf) rather than fully defined
        #[arg(long)]
        primitive: bool,
        /// Shorten URIs for readability
        #[arg(short = 's', long)]
        short_uris: bool,
        /// Remove SNOMED CT class declarations and labels
        #[arg(short = 'r', long)]
        remove_artifacts: bool,
        /// Output format (see `cgowl formats`)
        #[arg(long, default_value = "n3")]
        format: String,
        #[command(flatten)]
        gateway: GatewayArgs,
    },

    /// List output formats.
    Formats,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("CGOWL_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Annotations {
            input,
            out,
            input_format,
            fully_defined,
            short_uris,
            remove_artifacts,
            format,
            report,
            gateway,
        } => commands::cmd_annotations(commands::AnnotationArgs {
            input,
            out,
            input_format,
            fully_defined,
            short_uris,
            remove_artifacts,
            format,
            report,
            gateway,
        }),
        Commands::Tsv {
            input,
            out,
            format,
            map_file,
            report,
            gateway,
        } => commands::cmd_tsv(&input, &out, &format, map_file.as_deref(), report.as_deref(), &gateway),
        Commands::Expr {
            expression,
            subject,
            primitive,
            short_uris,
            remove_artifacts,
            format,
            gateway,
        } => {
            let mut request = cgowl_convert::ConversionRequest::new(subject, expression);
            request.primitive = primitive;
            request.shorten_uris = short_uris;
            request.strip_artifacts = remove_artifacts;
            request.format = format;
            commands::cmd_expr(&request, &gateway)
        }
        Commands::Formats => {
            commands::cmd_formats();
            Ok(())
        }
    }
}
