mod config;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reweave_convert::{convert_text, detect_dialect, parse_story, RewriterRegistry};
use reweave_core::{ConversionReport, Dialect};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "reweave", version, about = "Convert interactive-fiction stories between Harlowe, SugarCube, Chapbook, Snowman and Ink")]
struct Cli {
    /// Config file (default: <config dir>/reweave/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a story file to another dialect
    Convert {
        /// Twee or Ink source file
        input: PathBuf,

        /// Source dialect, or `auto` to detect it
        #[arg(long, default_value = "auto")]
        from: String,

        /// Target dialect (default: `default_target` from the config)
        #[arg(long)]
        to: Option<Dialect>,

        /// Write the converted story here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// annotated, verbatim or plain
        #[arg(long)]
        preset: Option<String>,

        /// Rule to skip (repeatable), e.g. `--skip markup`
        #[arg(long = "skip", value_name = "RULE")]
        skip_rules: Vec<String>,

        /// Write the conversion report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Indent the JSON report
        #[arg(long)]
        pretty: bool,

        /// Rewrite passages on worker threads
        #[arg(long)]
        parallel: bool,
    },

    /// Show the compatibility matrix for a dialect pair
    Matrix {
        from: Dialect,
        to: Dialect,

        /// Print the rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the constructs a conversion would touch, without converting
    Check {
        input: PathBuf,

        #[arg(long, default_value = "auto")]
        from: String,

        #[arg(long)]
        to: Option<Dialect>,
    },

    /// Read and combine saved reports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Print a saved report as a summary
    Show { file: PathBuf },

    /// Combine several reports into one
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Convert {
            input,
            from,
            to,
            output,
            preset,
            skip_rules,
            report,
            pretty,
            parallel,
        } => {
            let overrides = Overrides {
                preset,
                skip_rules,
                parallel,
            };
            let pretty = pretty || config.pretty_report;
            cmd_convert(&config, &input, &from, to, output.as_deref(), &overrides, report.as_deref(), pretty)
        }
        Command::Matrix { from, to, json } => cmd_matrix(from, to, json),
        Command::Check { input, from, to } => cmd_check(&config, &input, &from, to),
        Command::Report { command } => match command {
            ReportCommand::Show { file } => cmd_report_show(&file),
            ReportCommand::Merge {
                files,
                output,
                pretty,
            } => cmd_report_merge(&files, output.as_deref(), pretty || config.pretty_report),
        },
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn source_dialect(from: &str, text: &str, input: &Path) -> Result<Dialect> {
    if from.eq_ignore_ascii_case("auto") {
        let dialect = detect_dialect(text).ok_or_else(|| {
            anyhow!(
                "could not detect the dialect of {}; pass --from",
                input.display()
            )
        })?;
        info!(dialect = %dialect, "detected source dialect");
        return Ok(dialect);
    }
    Ok(from.parse()?)
}

fn target_dialect(config: &Config, to: Option<Dialect>) -> Result<Dialect> {
    match to.or(config.default_target()?) {
        Some(dialect) => Ok(dialect),
        None => bail!("no target dialect: pass --to or set default_target in the config"),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    config: &Config,
    input: &Path,
    from: &str,
    to: Option<Dialect>,
    output: Option<&Path>,
    overrides: &Overrides,
    report_path: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let text = read_input(input)?;
    let source = source_dialect(from, &text, input)?;
    let target = target_dialect(config, to)?;
    let options = config.options(overrides)?;

    let registry = RewriterRegistry::standard()?;
    let conversion = convert_text(&registry, &text, source, target, &options)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    for issue in &conversion.issues {
        warn!(file = %input.display(), "{issue}");
    }
    write_output(output, &conversion.text)?;

    if let Some(report) = &conversion.report {
        eprint!("{}", report.render_text());
        if let Some(path) = report_path {
            let json = if pretty {
                report.to_json_pretty()?
            } else {
                report.to_json()?
            };
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report {}", path.display()))?;
        }
    } else if report_path.is_some() {
        warn!("the selected preset produces no report; --report ignored");
    }
    Ok(())
}

fn cmd_matrix(from: Dialect, to: Dialect, json: bool) -> Result<()> {
    let registry = RewriterRegistry::standard()?;
    let pair = registry.get(from, to)?;
    let matrix = &pair.matrix;
    if json {
        println!("{}", serde_json::to_string_pretty(matrix)?);
        return Ok(());
    }

    let (converted, approximated, incompatible) = matrix.counts();
    println!("{from} -> {to}: {converted} converted, {approximated} approximated, {incompatible} incompatible");
    println!();
    for rule in matrix.rules() {
        let equivalent = rule.equivalent_syntax.as_deref().unwrap_or("-");
        println!("  {:<18} {:<13} {}", rule.feature, rule.classification, equivalent);
        if let Some(notes) = &rule.notes {
            println!("  {:<18} {:<13} ({notes})", "", "");
        }
    }
    Ok(())
}

fn cmd_check(config: &Config, input: &Path, from: &str, to: Option<Dialect>) -> Result<()> {
    let text = read_input(input)?;
    let source = source_dialect(from, &text, input)?;
    let target = target_dialect(config, to)?;
    let registry = RewriterRegistry::standard()?;
    let matrix = &registry.get(source, target)?.matrix;

    let (story, issues) = parse_story(&text, source);
    for issue in &issues {
        warn!(file = %input.display(), "{issue}");
    }
    let mut hits = 0;
    for passage in &story.passages {
        for hit in matrix.scan(&passage.content) {
            let line = passage.content[..hit.range.start].matches('\n').count() + 1;
            println!(
                "{}:{line}  {:<18} {}",
                passage.name, hit.rule.feature, hit.rule.classification
            );
            hits += 1;
        }
    }
    println!("{hits} construct(s) found for {source} -> {target}");
    Ok(())
}

fn read_report(path: &Path) -> Result<ConversionReport> {
    let json = read_input(path)?;
    ConversionReport::from_json(&json)
        .with_context(|| format!("invalid report {}", path.display()))
}

fn cmd_report_show(file: &Path) -> Result<()> {
    print!("{}", read_report(file)?.render_text());
    Ok(())
}

fn cmd_report_merge(files: &[PathBuf], output: Option<&Path>, pretty: bool) -> Result<()> {
    let mut reports = files.iter().map(|f| read_report(f));
    let Some(first) = reports.next() else {
        bail!("no reports to merge");
    };
    let mut merged = first?;
    for report in reports {
        merged.merge(report?);
    }
    let json = if pretty {
        merged.to_json_pretty()?
    } else {
        merged.to_json()?
    };
    write_output(output, &json)
}
