use thiserror::Error;

/// Failures raised while turning a catalog into a pipeline definition.
///
/// Generation is a pure function, so every variant is deterministic: the
/// same catalog always fails the same way and nothing is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("Catalog is empty: at least one deployable unit is required")]
    EmptyCatalog,

    #[error("Deployable unit at position {0} has a blank name")]
    BlankUnitName(usize),

    #[error(
        "Deployable unit name '{0}' is not a valid stack name (letters, digits and '-', starting with a letter)"
    )]
    InvalidUnitName(String),

    #[error("Duplicate deployable unit name '{0}'")]
    DuplicateUnit(String),

    #[error("Asset-publishing unit '{0}' requires a non-empty source_folder")]
    MissingSourceFolder(String),

    #[error("Unit '{0}' is not asset-publishing and cannot get a dedicated build")]
    NotAssetPublishing(String),

    #[error("Unsupported catalog version: {0}")]
    UnsupportedVersion(u32),

    #[error("Unit '{unit}' resolves to artifact '{artifact}' which no build action produces")]
    UnresolvedArtifact { unit: String, artifact: String },

    #[error("Template '{path}' for unit '{unit}' is not exported by artifact '{artifact}'")]
    TemplateNotExported {
        unit: String,
        artifact: String,
        path: String,
    },

    #[error("Artifact '{0}' is produced but never consumed by a deploy action")]
    OrphanArtifact(String),

    #[error("Action '{action}' reads artifact '{artifact}' before it is produced")]
    ForwardReference { action: String, artifact: String },

    #[error("Build project name '{0}' is used by more than one build action")]
    DuplicateProject(String),

    #[error("Elevated role '{role}' attached to non asset-publishing action '{action}'")]
    RoleMisuse { role: String, action: String },
}

impl GeneratorError {
    /// Configuration errors come from the catalog itself; everything else is
    /// a wiring fault detected in the assembled definition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GeneratorError::EmptyCatalog
                | GeneratorError::BlankUnitName(_)
                | GeneratorError::InvalidUnitName(_)
                | GeneratorError::DuplicateUnit(_)
                | GeneratorError::MissingSourceFolder(_)
                | GeneratorError::NotAssetPublishing(_)
                | GeneratorError::UnsupportedVersion(_)
        )
    }
}
