use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use pipegen::buildspec;
use pipegen::catalog::CatalogFile;
use pipegen::lockfile::generate_lock;
use pipegen::observability::{GenerationSummary, log_summary};
use pipegen::pipeline::{PipelineDefinition, generate_from_file};
use pipegen::presets::generate_preset;
use pipegen::validation::validate_catalog;
use serde::Serialize;
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_tracing()?;

    match cli.command {
        Commands::Generate {
            catalog,
            format,
            output,
            pipeline_name,
            branch,
            metrics_json,
            metrics_prometheus,
        } => generate_cmd(GenerateArgs {
            catalog,
            format,
            output,
            pipeline_name,
            branch,
            metrics_json,
            metrics_prometheus,
        }),
        Commands::Buildspec {
            catalog,
            unit,
            format,
        } => buildspec_cmd(&catalog, unit.as_deref(), format),
        Commands::Validate { catalog } => validate_catalog_cmd(&catalog),
        Commands::Lock { catalog, output } => lock_catalog(&catalog, &output),
        Commands::Catalog { action } => catalog_command(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pipegen", &mut io::stdout());
            Ok(())
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

struct GenerateArgs {
    catalog: PathBuf,
    format: OutputFormat,
    output: Option<PathBuf>,
    pipeline_name: Option<String>,
    branch: Option<String>,
    metrics_json: Option<PathBuf>,
    metrics_prometheus: Option<PathBuf>,
}

fn generate_cmd(args: GenerateArgs) -> Result<()> {
    let mut catalog = CatalogFile::load(&args.catalog)?;
    if let Some(name) = args.pipeline_name {
        catalog.pipeline.name = name;
    }
    if let Some(branch) = args.branch {
        catalog.pipeline.source.branch = branch;
    }

    let definition = load_definition(&catalog, &args.catalog)?;
    emit(&definition, args.format, args.output.as_deref())?;

    let summary = GenerationSummary::from_definition(&definition);
    log_summary(&summary);

    if let Some(path) = args.metrics_json {
        ensure_parent(&path, "metrics")?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        to_writer_pretty(file, &summary)
            .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
        info!(metrics = %path.display(), "Metrics JSON written");
    }
    if let Some(path) = args.metrics_prometheus {
        ensure_parent(&path, "metrics")?;
        fs::write(&path, summary.to_prometheus())
            .with_context(|| format!("Failed to write Prometheus metrics: {}", path.display()))?;
        info!(metrics = %path.display(), "Prometheus metrics written");
    }

    Ok(())
}

fn load_definition(catalog: &CatalogFile, path: &Path) -> Result<PipelineDefinition> {
    generate_from_file(catalog)
        .with_context(|| format!("Failed to generate pipeline from catalog: {}", path.display()))
}

fn buildspec_cmd(catalog_path: &Path, unit: Option<&str>, format: OutputFormat) -> Result<()> {
    let file = CatalogFile::load(catalog_path)?;
    let catalog = file.to_catalog()?;

    let target = match unit {
        Some(name) => Some(
            catalog
                .get(name)
                .ok_or_else(|| anyhow!("Unit '{name}' is not in the catalog"))?,
        ),
        None => None,
    };

    match buildspec::compile(target, &catalog, &file.pipeline.build)? {
        Some(spec) => emit(&spec, format, None),
        None => {
            warn!("Catalog has no generic units; no aggregate build spec is produced");
            Ok(())
        }
    }
}

fn emit<T: Serialize>(value: &T, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => {
            let mut text = serde_json::to_string_pretty(value)?;
            text.push('\n');
            text
        }
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };

    match output {
        Some(path) => {
            ensure_parent(path, "output")?;
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            info!(output = %path.display(), "Pipeline definition written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn ensure_parent(path: &Path, label: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create {label} directory: {}", parent.display())
        })?;
    }
    Ok(())
}

fn validate_catalog_cmd(catalog_path: &Path) -> Result<()> {
    let catalog = CatalogFile::load(catalog_path)?;
    let report = validate_catalog(&catalog);

    for warning in &report.warnings {
        warn!(file = %catalog_path.display(), "{warning}");
    }

    if report.is_ok() {
        info!(file = %catalog_path.display(), "Catalog validation passed");
        Ok(())
    } else {
        for error_msg in &report.errors {
            error!(file = %catalog_path.display(), "{error_msg}");
        }
        Err(anyhow!(
            "Catalog validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn lock_catalog(catalog_path: &Path, output_path: &Path) -> Result<()> {
    let catalog = CatalogFile::load(catalog_path)?;
    let report = validate_catalog(&catalog);

    for warning in &report.warnings {
        warn!(file = %catalog_path.display(), "{warning}");
    }

    if !report.is_ok() {
        for error_msg in &report.errors {
            error!(file = %catalog_path.display(), "{error_msg}");
        }
        return Err(anyhow!(
            "Cannot generate lockfile due to {} validation error(s)",
            report.errors.len()
        ));
    }

    let definition = load_definition(&catalog, catalog_path)?;
    ensure_parent(output_path, "lockfile")?;
    generate_lock(&definition, output_path)?;
    info!(
        lockfile = %output_path.display(),
        "Lockfile generated successfully"
    );

    Ok(())
}

fn catalog_command(command: CatalogCommands) -> Result<()> {
    match command {
        CatalogCommands::New { preset, output } => {
            let destination =
                output.unwrap_or_else(|| PathBuf::from(format!("catalogs/{preset}.yaml")));
            let generated = generate_preset(&preset, &destination)?;
            info!(
                preset = %preset,
                path = %generated.display(),
                "Preset catalog generated"
            );
            Ok(())
        }
        CatalogCommands::Lint { catalogs } => lint_catalogs(&catalogs),
        CatalogCommands::Diff { lhs, rhs } => diff_catalogs(&lhs, &rhs),
    }
}

fn lint_catalogs(catalogs: &[PathBuf]) -> Result<()> {
    if catalogs.is_empty() {
        bail!("No catalog files supplied for linting");
    }

    let mut failures = 0usize;

    for catalog_path in catalogs {
        match CatalogFile::load(catalog_path) {
            Ok(catalog) => {
                let report = validate_catalog(&catalog);
                for warning in &report.warnings {
                    warn!(file = %catalog_path.display(), "{warning}");
                }
                if report.is_ok() {
                    info!(file = %catalog_path.display(), "Lint passed");
                } else {
                    failures += 1;
                    for error_msg in &report.errors {
                        error!(file = %catalog_path.display(), "{error_msg}");
                    }
                }
            }
            Err(err) => {
                failures += 1;
                error!(file = %catalog_path.display(), "Failed to load catalog: {err:#}");
            }
        }
    }

    if failures > 0 {
        bail!("Lint failed for {failures} catalog(s)");
    }

    info!("All catalog lint checks passed");
    Ok(())
}

fn diff_catalogs(lhs: &Path, rhs: &Path) -> Result<()> {
    let left = CatalogFile::load(lhs)?;
    let right = CatalogFile::load(rhs)?;

    let mut differences = Vec::new();

    if left.version != right.version {
        differences.push(format!(
            "Version mismatch: {} vs {}",
            left.version, right.version
        ));
    }

    let left_pipeline = serde_json::to_value(&left.pipeline)?;
    let right_pipeline = serde_json::to_value(&right.pipeline)?;
    if left_pipeline != right_pipeline {
        differences.push(format!(
            "Pipeline settings differ: {} vs {}",
            serde_json::to_string(&left_pipeline).unwrap_or_else(|_| "<invalid>".into()),
            serde_json::to_string(&right_pipeline).unwrap_or_else(|_| "<invalid>".into())
        ));
    }

    let left_units = left.deployment_units();
    let right_units = right.deployment_units();
    if left_units.len() != right_units.len() {
        differences.push(format!(
            "Unit count differs: {} vs {}",
            left_units.len(),
            right_units.len()
        ));
    }

    for (idx, (l_unit, r_unit)) in left_units.iter().zip(right_units.iter()).enumerate() {
        if l_unit != r_unit {
            differences.push(format!(
                "Unit {} differs: {} vs {}",
                idx + 1,
                describe_unit(l_unit),
                describe_unit(r_unit)
            ));
        }
    }

    let min_len = left_units.len().min(right_units.len());
    for (extra_idx, unit) in left_units[min_len..].iter().enumerate() {
        differences.push(format!(
            "Extra unit in left catalog at position {}: '{}'",
            min_len + extra_idx + 1,
            unit.name
        ));
    }
    for (extra_idx, unit) in right_units[min_len..].iter().enumerate() {
        differences.push(format!(
            "Extra unit in right catalog at position {}: '{}'",
            min_len + extra_idx + 1,
            unit.name
        ));
    }

    if differences.is_empty() {
        info!(
            left = %lhs.display(),
            right = %rhs.display(),
            "Catalogs are equivalent"
        );
        println!("Catalogs match: {} == {}", lhs.display(), rhs.display());
        Ok(())
    } else {
        println!(
            "Catalog differences between '{}' and '{}':",
            lhs.display(),
            rhs.display()
        );
        for diff in &differences {
            println!("- {diff}");
        }
        bail!("Catalogs differ ({} difference(s) found)", differences.len());
    }
}

fn describe_unit(unit: &pipegen::DeployableUnit) -> String {
    serde_json::to_string(unit).unwrap_or_else(|_| unit.name.clone())
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Parser)]
#[command(
    name = "pipegen",
    version,
    about = "Compiles a catalog of stacks into a source/build/deploy pipeline definition"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the pipeline definition for a catalog
    Generate {
        catalog: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long = "pipeline-name")]
        pipeline_name: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
        #[arg(long = "metrics-prometheus")]
        metrics_prometheus: Option<PathBuf>,
    },
    /// Print one build spec; the aggregate spec when --unit is omitted
    Buildspec {
        catalog: PathBuf,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    Validate {
        catalog: PathBuf,
    },
    Lock {
        catalog: PathBuf,
        output: PathBuf,
    },
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    New {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Lint {
        #[arg(required = true)]
        catalogs: Vec<PathBuf>,
    },
    Diff {
        lhs: PathBuf,
        rhs: PathBuf,
    },
}
