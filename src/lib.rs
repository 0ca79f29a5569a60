//! Careers catalog: the data layer behind the careers progression site.
//!
//! The crate reads the SFIA skill matrix, role definitions and level
//! definitions from either files or Postgres, normalizes them into canonical
//! `Skills` and `Roles` documents, derives lookup indexes, and validates the
//! references between them. `CatalogStore` owns the loaded snapshot; the
//! presentation layer only reads from it.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub mod catalog;
pub mod config;
pub mod error;
pub mod normalize;
mod schema_loader;
pub mod sources;
pub mod store;
pub mod validation;

pub use catalog::{
    Category, CategoryId, IndexSet, LEVELS, LevelBlock, LevelDescriptor, LevelValue, Pathway,
    PathwayId, PathwayProgression, Role, RoleId, Roles, SfiaRow, Skill, SkillId, SkillLevel,
    SkillRequirement, Skills, parse_level_id,
};
pub use config::{DatabaseSettings, FilePaths, RoleTableLayout, SourceMode, StoreConfig};
pub use error::{AggregateValidationError, CatalogError};
pub use sources::{AiOverlay, CatalogSource, FileSource, PgSource};
pub use store::{CatalogStore, LoadOptions};
pub use validation::{ValidationReport, validate_catalog};

/// File whose presence marks a directory as holding catalog data.
const DATA_SENTINEL: &str = config::DEFAULT_ROLES_JSON;

fn is_data_dir(candidate: &Path) -> bool {
    candidate.join(DATA_SENTINEL).is_file()
}

fn data_dir_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.trim().is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_data_dir(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_data_dir(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the directory holding the catalog data files.
///
/// Honors `CAREERS_DATA_DIR` when it holds `roles.json`, then climbs from the
/// current directory, then tries the build-time hint. Falls back to the
/// current directory so a missing file surfaces as a read error naming it.
pub fn find_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("CAREERS_DATA_DIR") {
        if let Some(found) = data_dir_from_hint(&dir) {
            return found;
        }
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if let Some(found) = search_upwards(&cwd) {
        return found;
    }

    if let Some(hint) = option_env!("CAREERS_DATA_ROOT_HINT") {
        if let Some(found) = data_dir_from_hint(hint) {
            return found;
        }
    }

    cwd
}
