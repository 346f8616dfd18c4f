use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::pipeline::{Action, PipelineDefinition};

#[derive(Debug, Serialize)]
pub struct PipelineLock {
    pub pipeline: String,
    pub generated_at: DateTime<Utc>,
    pub fingerprint: String,
    pub units: Vec<String>,
    pub stages: Vec<StageLock>,
}

#[derive(Debug, Serialize)]
pub struct StageLock {
    pub name: String,
    pub actions: Vec<ActionLock>,
}

#[derive(Debug, Serialize)]
pub struct ActionLock {
    pub name: String,
    pub digest: String,
}

pub fn build_lock(definition: &PipelineDefinition) -> Result<PipelineLock> {
    let stages = definition
        .stages
        .iter()
        .map(|stage| {
            let actions = stage
                .actions
                .iter()
                .map(|action| {
                    Ok(ActionLock {
                        name: action.name().to_string(),
                        digest: hash_action(action)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(StageLock {
                name: format!("{:?}", stage.name),
                actions,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineLock {
        pipeline: definition.name.clone(),
        generated_at: Utc::now(),
        fingerprint: fingerprint(definition)?,
        units: definition
            .deploy_actions()
            .map(|deploy| deploy.stack_name.clone())
            .collect(),
        stages,
    })
}

pub fn generate_lock(definition: &PipelineDefinition, path: &Path) -> Result<()> {
    let lock = build_lock(definition)?;

    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;

    Ok(())
}

/// SHA-256 over the canonical JSON of the whole definition. Identical
/// catalogs produce identical fingerprints.
pub fn fingerprint(definition: &PipelineDefinition) -> Result<String> {
    let serialized =
        serde_json::to_vec(definition).context("Failed to serialize pipeline definition")?;
    Ok(hex_digest(&serialized))
}

fn hash_action(action: &Action) -> Result<String> {
    let serialized = serde_json::to_vec(action)
        .with_context(|| format!("Failed to serialize action '{}'", action.name()))?;
    Ok(hex_digest(&serialized))
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
