pub mod buildspec;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lockfile;
pub mod observability;
pub mod pipeline;
pub mod presets;
pub mod role;
pub mod validation;
pub mod wiring;

pub use catalog::{Catalog, CatalogFile, DeployableUnit, UnitKind};
pub use config::PipelineConfig;
pub use error::GeneratorError;
pub use pipeline::{PipelineDefinition, assemble, generate};
