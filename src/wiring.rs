use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::catalog::{Catalog, UnitKind};
use crate::error::GeneratorError;
use crate::pipeline::{Action, ArtifactId, BuildAction, BuildScope, PipelineDefinition};

/// One file inside one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplatePath {
    pub artifact: ArtifactId,
    pub file: String,
}

/// Template location for every catalog unit, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wiring {
    entries: Vec<(String, TemplatePath)>,
}

impl Wiring {
    pub fn get(&self, unit: &str) -> Option<&TemplatePath> {
        self.entries
            .iter()
            .find(|(name, _)| name == unit)
            .map(|(_, path)| path)
    }

    pub fn into_templates(self) -> impl Iterator<Item = TemplatePath> {
        self.entries.into_iter().map(|(_, path)| path)
    }
}

/// Maps each unit to the artifact and path its deploy action reads.
///
/// Generic units share the aggregate artifact and differ by file name;
/// asset-publishing units read from their own dedicated artifact. The
/// producing action must export the template through its artifact globs.
pub fn resolve(catalog: &Catalog, build_actions: &[BuildAction]) -> Result<Wiring, GeneratorError> {
    let mut entries = Vec::with_capacity(catalog.len());

    for unit in catalog.units() {
        let (expected, producer) = match &unit.kind {
            UnitKind::Generic => (
                ArtifactId::aggregate(),
                build_actions
                    .iter()
                    .find(|action| action.scope() == BuildScope::Aggregate),
            ),
            UnitKind::AssetPublishing { .. } => (
                ArtifactId::dedicated(&unit.name),
                build_actions.iter().find(|action| {
                    action.scope() == BuildScope::Dedicated && action.units() == [unit.name.as_str()]
                }),
            ),
        };

        let producer = producer.ok_or_else(|| GeneratorError::UnresolvedArtifact {
            unit: unit.name.clone(),
            artifact: expected.to_string(),
        })?;

        let file = unit.template_file();
        if !producer.project().spec().exports(&file) {
            return Err(GeneratorError::TemplateNotExported {
                unit: unit.name.clone(),
                artifact: producer.output().to_string(),
                path: file,
            });
        }

        entries.push((
            unit.name.clone(),
            TemplatePath {
                artifact: producer.output().clone(),
                file,
            },
        ));
    }

    Ok(Wiring { entries })
}

/// Checks a finished definition: build project names are unique, every
/// consumed artifact is produced in an earlier stage, every build artifact
/// feeds a deploy action, deploy templates are exported by their producer,
/// and the elevated role only appears on dedicated builds.
pub fn verify(definition: &PipelineDefinition) -> Result<(), GeneratorError> {
    let mut projects = HashSet::new();
    for build in definition.build_actions() {
        if !projects.insert(build.project().name()) {
            return Err(GeneratorError::DuplicateProject(
                build.project().name().to_string(),
            ));
        }
    }

    let mut producers: HashMap<&ArtifactId, usize> = HashMap::new();
    for (stage_idx, stage) in definition.stages.iter().enumerate() {
        for action in &stage.actions {
            if let Some(output) = action.output() {
                producers.insert(output, stage_idx);
            }
        }
    }

    let mut consumed_by_deploy: HashSet<&ArtifactId> = HashSet::new();
    for (stage_idx, stage) in definition.stages.iter().enumerate() {
        for action in &stage.actions {
            let Some(input) = action.input() else {
                continue;
            };
            match producers.get(input) {
                None => {
                    return Err(GeneratorError::UnresolvedArtifact {
                        unit: action.name().to_string(),
                        artifact: input.to_string(),
                    });
                }
                Some(&producer_stage) if producer_stage >= stage_idx => {
                    return Err(GeneratorError::ForwardReference {
                        action: action.name().to_string(),
                        artifact: input.to_string(),
                    });
                }
                Some(_) => {}
            }

            if let Action::Deploy(deploy) = action {
                consumed_by_deploy.insert(input);
                let exported = definition
                    .build_actions()
                    .find(|build| build.output() == input)
                    .is_some_and(|build| build.project().spec().exports(&deploy.template.file));
                if !exported {
                    return Err(GeneratorError::TemplateNotExported {
                        unit: deploy.stack_name.clone(),
                        artifact: input.to_string(),
                        path: deploy.template.file.clone(),
                    });
                }
            }
        }
    }

    for build in definition.build_actions() {
        if !consumed_by_deploy.contains(build.output()) {
            return Err(GeneratorError::OrphanArtifact(build.output().to_string()));
        }
        verify_role(definition, build)?;
    }

    Ok(())
}

fn verify_role(definition: &PipelineDefinition, build: &BuildAction) -> Result<(), GeneratorError> {
    let Some(role) = build.project().role() else {
        return Ok(());
    };
    let known = definition.roles.iter().any(|r| r.name == role.as_str());
    if build.scope() != BuildScope::Dedicated || !known {
        return Err(GeneratorError::RoleMisuse {
            role: role.as_str().to_string(),
            action: build.name().to_string(),
        });
    }
    Ok(())
}
