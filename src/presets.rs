use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogFile, DeployableUnit};
use crate::config::PipelineConfig;

pub const PRESETS: &[&str] = &["single", "lambda-infra"];

pub fn generate_preset(name: &str, destination: &Path) -> Result<PathBuf> {
    let preset = match name {
        "single" => single_preset(),
        "lambda-infra" => lambda_infra_preset(),
        other => anyhow::bail!(
            "Unknown preset '{other}'. Available presets: {}",
            PRESETS.join(", ")
        ),
    };

    let rendered = serde_yaml::to_string(&preset)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write preset catalog: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}

fn single_preset() -> CatalogFile {
    CatalogFile {
        version: 1,
        pipeline: PipelineConfig::default(),
        units: vec![DeployableUnit::generic("InfraStack")],
    }
}

/// A function stack with its own code folder followed by the infrastructure
/// that subscribes to it, with the pipeline stack deployed last.
fn lambda_infra_preset() -> CatalogFile {
    CatalogFile {
        version: 1,
        pipeline: PipelineConfig {
            stack_name: Some("CodePipelineStack".into()),
            ..PipelineConfig::default()
        },
        units: vec![
            DeployableUnit::asset_publishing("LambdaStack", "lambda-code"),
            DeployableUnit::generic("InfraStack"),
        ],
    }
}
