use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use cgowl_convert::vocab::SCTID_NS;
use cgowl_convert::{
    read_rows, tsv_render_options, AnnotationConversion, CancelFlag, ConversionReport, ConversionRequest,
    ConversionService, FailureKind, ModePolicy, TsvConversion,
};
use cgowl_gateway::{ConverterGateway, DefinitionMode, GatewayConfig, TcpEndpoint};
use cgowl_rdf::{parse_file, ArtifactFilter, Graph, InputFormat, RenderOptions, Renderer};
use colored::Colorize;

use crate::GatewayArgs;

pub struct AnnotationArgs {
    pub input: PathBuf,
    pub out: PathBuf,
    pub input_format: Option<String>,
    pub fully_defined: bool,
    pub short_uris: bool,
    pub remove_artifacts: bool,
    pub format: String,
    pub report: Option<PathBuf>,
    pub gateway: GatewayArgs,
}

fn gateway_config(args: &GatewayArgs) -> Result<GatewayConfig> {
    let config = GatewayConfig::from_env()?
        .with_host(args.host.clone())
        .with_port(args.port)?
        .with_timeout_secs(args.timeout_secs)?;
    Ok(config)
}

/// Lazily connecting gateway; the first conversion opens the connection.
fn open_gateway(args: &GatewayArgs) -> Result<ConverterGateway> {
    let config = gateway_config(args)?;
    tracing::info!(endpoint = %config.endpoint(), timeout = ?config.timeout, "using converter");
    Ok(ConverterGateway::new(TcpEndpoint::new(config)))
}

/// SIGINT stops the run between expressions; a second SIGINT exits.
fn install_cancel_handler() -> Result<CancelFlag> {
    let cancel = CancelFlag::new();
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGINT;
        signal_hook::flag::register_conditional_shutdown(SIGINT, 130, cancel.as_atomic())
            .map_err(|e| anyhow!("failed to register SIGINT: {e}"))?;
        signal_hook::flag::register(SIGINT, cancel.as_atomic())
            .map_err(|e| anyhow!("failed to register SIGINT: {e}"))?;
    }
    Ok(cancel)
}

fn check_format(renderer: &Renderer, format: &str) -> Result<()> {
    if renderer.registry().get(format).is_none() {
        bail!(
            "unknown output format `{format}` (available: {})",
            renderer.registry().names().join(", ")
        );
    }
    Ok(())
}

fn artifact_filter() -> Result<ArtifactFilter> {
    ArtifactFilter::for_namespace(SCTID_NS).context("building artifact filter")
}

fn render_to(renderer: &Renderer, graph: &Graph, options: &RenderOptions, out: &Path) -> Result<()> {
    let text = renderer
        .render(graph, options)
        .with_context(|| format!("rendering {}", out.display()))?;
    fs::write(out, text).with_context(|| format!("writing {}", out.display()))?;
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}

fn write_report(report: &ConversionReport, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, report.to_json()?).with_context(|| format!("writing {}", path.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
    }
    Ok(())
}

fn summarize(report: &ConversionReport) -> Result<()> {
    for failure in &report.failures {
        match &failure.kind {
            FailureKind::Unmapped => {
                eprintln!("{} no conversion available for {}", "skip".yellow(), failure.subject)
            }
            FailureKind::InvalidSubject { reason } => {
                eprintln!("{} {} ({reason})", "skip".yellow(), failure.subject)
            }
            FailureKind::Translation { error } => eprintln!(
                "{} conversion error on {} ({}): {error}",
                "error".red().bold(),
                failure.subject,
                failure.text
            ),
            FailureKind::RepairMismatch { error } => eprintln!(
                "{} converter output for {} does not parse: {error}",
                "error".red().bold(),
                failure.subject
            ),
            FailureKind::PrefixConflict {
                prefix,
                existing,
                incoming,
            } => eprintln!(
                "{} {}: prefix `{prefix}` is <{existing}>, answer binds it to <{incoming}>",
                "skip".yellow(),
                failure.subject
            ),
        }
    }
    eprintln!(
        "{} converted {} expression(s), {} failure(s){}",
        "ok".green().bold(),
        report.converted,
        report.failures.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    let mismatches = report.count(|k| matches!(k, FailureKind::RepairMismatch { .. }));
    if mismatches > 0 {
        bail!("{mismatches} converter answer(s) could not be repaired");
    }
    Ok(())
}

pub fn cmd_annotations(args: AnnotationArgs) -> Result<()> {
    let renderer = Renderer::default();
    check_format(&renderer, &args.format)?;

    let input_format = match &args.input_format {
        Some(name) => Some(
            InputFormat::parse_name(name).ok_or_else(|| anyhow!("unknown input format `{name}`"))?,
        ),
        None => None,
    };
    let source = parse_file(&args.input, input_format)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let gateway = open_gateway(&args.gateway)?;
    let mode = if args.fully_defined {
        DefinitionMode::FullyDefined
    } else {
        DefinitionMode::Primitive
    };
    let (target, report) = AnnotationConversion::new(&gateway)?
        .with_mode(ModePolicy::Fixed(mode))
        .with_cancel(install_cancel_handler()?)
        .run(&source)?;

    let options = RenderOptions {
        format: args.format.clone(),
        compact_prefixes: args.short_uris,
        strip_artifacts: if args.remove_artifacts {
            Some(artifact_filter()?)
        } else {
            None
        },
    };
    render_to(&renderer, &target, &options, &args.out)?;
    write_report(&report, args.report.as_deref())?;
    summarize(&report)
}

pub fn cmd_tsv(
    input: &Path,
    out: &Path,
    format: &str,
    map_file: Option<&Path>,
    report_path: Option<&Path>,
    gateway_args: &GatewayArgs,
) -> Result<()> {
    let renderer = Renderer::default();
    check_format(&renderer, format)?;

    let file = fs::File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let rows = read_rows(BufReader::new(file)).with_context(|| format!("reading {}", input.display()))?;

    let mut map_graph = match map_file {
        Some(path) => Some(
            parse_file(path, Some(InputFormat::Turtle))
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let gateway = open_gateway(gateway_args)?;
    let (graph, report) = TsvConversion::new(&gateway)
        .with_cancel(install_cancel_handler()?)
        .run(&rows, map_graph.as_mut())?;

    let options = tsv_render_options(format).context("building label filter")?;
    render_to(&renderer, &graph, &options, out)?;

    if let (Some(path), Some(map)) = (map_file, map_graph.as_ref()) {
        let mut target = path.as_os_str().to_owned();
        target.push("upd.ttl");
        let map_options = RenderOptions {
            format: "turtle".to_string(),
            compact_prefixes: true,
            strip_artifacts: None,
        };
        render_to(&renderer, map, &map_options, Path::new(&target))?;
    }

    write_report(&report, report_path)?;
    summarize(&report)
}

pub fn cmd_expr(request: &ConversionRequest, gateway_args: &GatewayArgs) -> Result<()> {
    let service = ConversionService::new(open_gateway(gateway_args)?)?;
    match service.convert(request) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(failure) => Err(anyhow!(failure)),
    }
}

pub fn cmd_formats() {
    for name in Renderer::default().registry().names() {
        println!("{name}");
    }
}
