//! Raw data sources behind a single `CatalogSource` interface.
//!
//! A store is built with exactly one source: `FileSource` reads the CSV and
//! JSON files, `PgSource` reads the `careers` schema. Both hand back the same
//! raw shapes, so normalization is oblivious to where the data came from.

mod file;
mod overlay;
mod postgres;

use crate::catalog::{LevelDefinitions, RawRolesDocument, SfiaRow};
use crate::config::SourceMode;
use anyhow::Result;
use async_trait::async_trait;

pub use file::{FileSource, parse_sfia_csv, read_level_definitions};
pub use overlay::{AiOverlay, load_ai_overlay, parse_ai_overlay};
pub use postgres::{
    CompetencyRow, PathwayRow, PathwaySelectionRow, PgSource, RequirementRows, RoleLevelRow,
    RoleRow, RoleTableRows, assemble_roles,
};

/// One backend for the three raw documents. Each read is independent and
/// may run concurrently with the others.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn mode(&self) -> SourceMode;

    async fn read_sfia_rows(&self) -> Result<Vec<SfiaRow>>;

    async fn read_roles(&self) -> Result<RawRolesDocument>;

    async fn read_level_definitions(&self) -> Result<LevelDefinitions>;
}
