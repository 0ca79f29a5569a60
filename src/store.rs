//! The catalog store: owns the loaded documents and rebuilds them on demand.
//!
//! Loads are serialized by an async mutex held for the whole operation, so
//! two overlapping `load_all` calls cannot interleave their swaps. Each load
//! builds new documents and indexes off to the side and swaps them into the
//! snapshot in one step; getters only ever clone `Arc`s out of the snapshot
//! and never trigger a load.

use crate::catalog::{IndexSet, RoleIndexes, Roles, SfiaIndex, SfiaRow, SkillIndexes, Skills};
use crate::config::{SourceMode, StoreConfig};
use crate::error::CatalogError;
use crate::normalize::{normalize_roles, normalize_skills};
use crate::sources::{CatalogSource, FileSource, PgSource, load_ai_overlay};
use crate::validation::{ValidationReport, validate_catalog};
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoadOptions {
    pub validate: bool,
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            validate: true,
            strict: true,
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    skills: Arc<Skills>,
    roles: Arc<Roles>,
    sfia_rows: Arc<Vec<SfiaRow>>,
    indexes: IndexSet,
}

pub struct CatalogStore {
    source: Box<dyn CatalogSource>,
    overlay_path: Option<PathBuf>,
    snapshot: RwLock<Snapshot>,
    load_lock: Mutex<()>,
}

impl CatalogStore {
    /// Build a store whose backend is fixed by `config.mode`.
    ///
    /// Database mode creates a lazily connecting pool and so must run inside
    /// a tokio runtime; no connection is made until the first load.
    pub fn new(config: &StoreConfig) -> Result<Self, CatalogError> {
        let source: Box<dyn CatalogSource> = match config.mode {
            SourceMode::File => Box::new(FileSource::new(config.files.clone())),
            SourceMode::Db => Box::new(PgSource::connect_lazy(
                &config.database,
                config.role_tables,
                config.files.levels_json.clone(),
            )?),
        };
        Ok(Self::with_source(
            source,
            Some(config.files.ai_descriptions.clone()),
        ))
    }

    /// Build a store over any source; `overlay_path` of `None` disables the overlay.
    pub fn with_source(source: Box<dyn CatalogSource>, overlay_path: Option<PathBuf>) -> Self {
        Self {
            source,
            overlay_path,
            snapshot: RwLock::new(Snapshot::default()),
            load_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    pub fn skills(&self) -> Arc<Skills> {
        Arc::clone(&self.read().skills)
    }

    pub fn roles(&self) -> Arc<Roles> {
        Arc::clone(&self.read().roles)
    }

    /// Raw SFIA rows in source order, annotated once skills are loaded.
    pub fn sfia_rows(&self) -> Arc<Vec<SfiaRow>> {
        Arc::clone(&self.read().sfia_rows)
    }

    pub fn indexes(&self) -> IndexSet {
        self.read().indexes.clone()
    }

    /// Reload the raw SFIA rows and their index.
    pub async fn load_sfia(&self) -> Result<Arc<Vec<SfiaRow>>, CatalogError> {
        let _guard = self.load_lock.lock().await;
        self.refresh_sfia().await
    }

    /// Reload the roles document and its indexes.
    pub async fn load_roles(&self) -> Result<Arc<Roles>, CatalogError> {
        let _guard = self.load_lock.lock().await;
        self.refresh_roles().await
    }

    /// Rebuild the skills document, reading SFIA rows first if none are loaded.
    pub async fn load_skills(&self) -> Result<Arc<Skills>, CatalogError> {
        let _guard = self.load_lock.lock().await;
        let needs_rows = self.read().sfia_rows.is_empty();
        if needs_rows {
            self.refresh_sfia().await?;
        }
        self.refresh_skills().await
    }

    /// Load everything: SFIA rows and roles together, then skills, then validation.
    ///
    /// With `strict` validation any data error fails the load after the
    /// documents have been swapped in; otherwise errors are logged and
    /// returned in the report.
    pub async fn load_all(&self, options: LoadOptions) -> Result<ValidationReport, CatalogError> {
        let _guard = self.load_lock.lock().await;
        info!(mode = %self.mode(), "loading careers catalog");

        tokio::try_join!(self.refresh_sfia(), self.refresh_roles())?;
        self.refresh_skills().await?;

        if !options.validate {
            return Ok(ValidationReport::default());
        }
        let report = self.run_validation().into_result(options.strict)?;
        info!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "careers catalog loaded"
        );
        Ok(report)
    }

    pub async fn load_core(&self, options: LoadOptions) -> Result<ValidationReport, CatalogError> {
        self.load_all(options).await
    }

    /// Re-run validation against the current snapshot.
    pub fn validate(&self, strict: bool) -> Result<ValidationReport, CatalogError> {
        Ok(self.run_validation().into_result(strict)?)
    }

    fn run_validation(&self) -> ValidationReport {
        let snapshot = self.read();
        validate_catalog(&snapshot.skills, &snapshot.roles, &snapshot.indexes)
    }

    async fn refresh_sfia(&self) -> Result<Arc<Vec<SfiaRow>>, CatalogError> {
        let rows = self
            .source
            .read_sfia_rows()
            .await
            .map_err(|err| CatalogError::source_read("SFIA skills", err))?;
        info!(source = "sfia", count = rows.len(), "loaded SFIA rows");

        let index = Arc::new(SfiaIndex::build(&rows));
        let rows = Arc::new(rows);
        let mut snapshot = self.write();
        snapshot.sfia_rows = Arc::clone(&rows);
        snapshot.indexes.sfia = index;
        Ok(rows)
    }

    async fn refresh_roles(&self) -> Result<Arc<Roles>, CatalogError> {
        let raw = self
            .source
            .read_roles()
            .await
            .map_err(|err| CatalogError::source_read("roles", err))?;
        let roles = normalize_roles(raw);
        info!(
            source = "roles",
            count = roles.roles.len(),
            pathways = roles.pathways.len(),
            "loaded roles"
        );

        let index = Arc::new(RoleIndexes::build(&roles));
        let roles = Arc::new(roles);
        let mut snapshot = self.write();
        snapshot.roles = Arc::clone(&roles);
        snapshot.indexes.roles = index;
        Ok(roles)
    }

    async fn refresh_skills(&self) -> Result<Arc<Skills>, CatalogError> {
        let definitions = self
            .source
            .read_level_definitions()
            .await
            .map_err(|err| CatalogError::source_read("level definitions", err))?;
        let overlay = match &self.overlay_path {
            Some(path) => load_ai_overlay(path).await,
            None => Default::default(),
        };

        let rows = self.sfia_rows();
        let normalized = normalize_skills(&rows, definitions.levels, &overlay);
        info!(
            source = "skills",
            count = normalized.skills.skills.len(),
            categories = normalized.skills.categories.len(),
            "normalized skills"
        );

        let skills_index = Arc::new(SkillIndexes::build(&normalized.skills));
        let sfia_index = Arc::new(SfiaIndex::build(&normalized.rows));
        let skills = Arc::new(normalized.skills);
        let mut snapshot = self.write();
        snapshot.skills = Arc::clone(&skills);
        snapshot.sfia_rows = Arc::new(normalized.rows);
        snapshot.indexes.skills = skills_index;
        snapshot.indexes.sfia = sfia_index;
        Ok(skills)
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LevelDefinitions, RawRolesDocument};
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source counting SFIA reads.
    struct StaticSource {
        sfia_reads: Arc<AtomicUsize>,
        fail_roles: bool,
    }

    #[async_trait]
    impl CatalogSource for StaticSource {
        fn mode(&self) -> SourceMode {
            SourceMode::File
        }

        async fn read_sfia_rows(&self) -> Result<Vec<SfiaRow>> {
            self.sfia_reads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SfiaRow::new(BTreeMap::from([
                ("Code".to_string(), "PROG".to_string()),
                ("Skill".to_string(), "Programming".to_string()),
                ("Category".to_string(), "Development".to_string()),
            ]))])
        }

        async fn read_roles(&self) -> Result<RawRolesDocument> {
            if self.fail_roles {
                bail!("roles unavailable");
            }
            Ok(serde_json::from_value(json!({
                "pathways": [{"id": "ic"}],
                "roles": [{"id": "dev", "name": "Developer"}]
            }))?)
        }

        async fn read_level_definitions(&self) -> Result<LevelDefinitions> {
            Ok(LevelDefinitions::default())
        }
    }

    /// Source logging the start and end of each read, yielding in between.
    struct TracingSource {
        events: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl TracingSource {
        async fn step(&self, start: &'static str, end: &'static str) {
            self.events.lock().unwrap().push(start);
            tokio::task::yield_now().await;
            self.events.lock().unwrap().push(end);
        }
    }

    #[async_trait]
    impl CatalogSource for TracingSource {
        fn mode(&self) -> SourceMode {
            SourceMode::File
        }

        async fn read_sfia_rows(&self) -> Result<Vec<SfiaRow>> {
            self.step("sfia:start", "sfia:end").await;
            Ok(Vec::new())
        }

        async fn read_roles(&self) -> Result<RawRolesDocument> {
            self.step("roles:start", "roles:end").await;
            Ok(serde_json::from_value(json!({"pathways": [], "roles": []}))?)
        }

        async fn read_level_definitions(&self) -> Result<LevelDefinitions> {
            self.step("levels:start", "levels:end").await;
            Ok(LevelDefinitions::default())
        }
    }

    fn store(fail_roles: bool) -> (CatalogStore, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let source = StaticSource {
            sfia_reads: Arc::clone(&reads),
            fail_roles,
        };
        (CatalogStore::with_source(Box::new(source), None), reads)
    }

    #[tokio::test]
    async fn getters_are_empty_before_load() {
        let (store, reads) = store(false);
        assert!(store.skills().skills.is_empty());
        assert!(store.roles().roles.is_empty());
        assert!(store.sfia_rows().is_empty());
        assert_eq!(store.indexes(), IndexSet::default());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn load_skills_reads_sfia_once() {
        let (store, reads) = store(false);
        store.load_skills().await.expect("load skills");
        store.load_skills().await.expect("reload skills");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(store.skills().skills[0].id.0, "PROG");
        assert!(store.indexes().sfia_row("PROG").is_some());
    }

    #[tokio::test]
    async fn strict_load_fails_but_keeps_documents() {
        let (store, _) = store(false);
        let err = store
            .load_all(LoadOptions::default())
            .await
            .expect_err("role has no ic pathway");
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(store.roles().roles.len(), 1);

        let report = store.validate(false).expect("lenient validation");
        assert_eq!(report.errors, vec!["Role dev missing pathway ic"]);
    }

    #[tokio::test]
    async fn overlapping_loads_run_one_after_another() {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let source = TracingSource {
            events: Arc::clone(&events),
        };
        let store = CatalogStore::with_source(Box::new(source), None);
        let options = LoadOptions {
            validate: false,
            strict: false,
        };

        let (first, second) = tokio::join!(store.load_all(options), store.load_all(options));
        first.expect("first load");
        second.expect("second load");

        let events = events.lock().unwrap().clone();
        assert_eq!(events.len(), 12, "{events:?}");
        let (one, two) = events.split_at(6);
        // the second load only starts once the first has finished
        assert_eq!(one.last(), Some(&"levels:end"), "{events:?}");
        assert_eq!(one, two);

        let pos = |name: &str| one.iter().position(|event| *event == name).unwrap();
        // SFIA and roles reads overlap
        assert!(pos("roles:start") < pos("sfia:end"), "{one:?}");
        assert!(pos("sfia:start") < pos("roles:end"), "{one:?}");
        // skills wait for both
        assert!(pos("sfia:end") < pos("levels:start"), "{one:?}");
        assert!(pos("roles:end") < pos("levels:start"), "{one:?}");
    }

    #[tokio::test]
    async fn source_failure_is_a_read_error() {
        let (store, _) = store(true);
        let err = store
            .load_all(LoadOptions {
                validate: false,
                strict: false,
            })
            .await
            .expect_err("roles read fails");
        match err {
            CatalogError::SourceRead {
                source_name,
                detail,
            } => {
                assert_eq!(source_name, "roles");
                assert!(detail.contains("roles unavailable"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(store.skills().skills.is_empty());
    }
}
