use crate::catalog::{
    LevelDefinitions, RawRolesDocument, SfiaRow, parse_level_definitions, parse_roles_document,
};
use crate::config::{FilePaths, SourceMode};
use crate::sources::CatalogSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::{ReaderBuilder, Trim};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Reads the catalog from the CSV export and JSON documents on disk.
#[derive(Clone, Debug)]
pub struct FileSource {
    paths: FilePaths,
}

impl FileSource {
    pub fn new(paths: FilePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &FilePaths {
        &self.paths
    }
}

#[async_trait]
impl CatalogSource for FileSource {
    fn mode(&self) -> SourceMode {
        SourceMode::File
    }

    async fn read_sfia_rows(&self) -> Result<Vec<SfiaRow>> {
        let path = &self.paths.sfia_csv;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let rows = parse_sfia_csv(&data).with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), rows = rows.len(), "read SFIA csv");
        Ok(rows)
    }

    async fn read_roles(&self) -> Result<RawRolesDocument> {
        let path = &self.paths.roles_json;
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        parse_roles_document(&data).with_context(|| format!("loading {}", path.display()))
    }

    async fn read_level_definitions(&self) -> Result<LevelDefinitions> {
        read_level_definitions(&self.paths.levels_json).await
    }
}

/// Level definitions always come from disk, whichever backend holds the rest.
pub async fn read_level_definitions(path: &Path) -> Result<LevelDefinitions> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_level_definitions(&data).with_context(|| format!("loading {}", path.display()))
}

/// Parse the SFIA skill matrix. Header names are trimmed, cell values kept
/// verbatim; short rows read as empty for their missing trailing columns and
/// cells past the last header are dropped.
pub fn parse_sfia_csv(data: &[u8]) -> Result<Vec<SfiaRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(data);
    let headers = reader.headers().context("reading csv header")?.clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // header is line 1
        let record = record.with_context(|| format!("decoding csv row {}", idx + 2))?;
        let fields: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                let cell = record.get(col).unwrap_or_default();
                (header.to_string(), cell.to_string())
            })
            .collect();
        rows.push(SfiaRow::new(fields));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CSV: &str = "ID, Code ,Skill,Category,Level 1,Level 1 description\n\
                       1,ARCH,Architecture,Technical,,\n\
                       2,PROG,\"Programming, general\",Development,Follow,\"Writes code.\nTests it.\"\n";

    #[test]
    fn csv_rows_keep_source_text() {
        let rows = parse_sfia_csv(CSV.as_bytes()).expect("parse csv");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code(), "ARCH");
        assert_eq!(rows[0].level_description(1), "");
        assert_eq!(rows[1].get("Skill"), "Programming, general");
        assert_eq!(rows[1].level_description(1), "Writes code.\nTests it.");
        assert!(rows[1].ai_levels.is_empty());
    }

    #[test]
    fn short_rows_fill_missing_columns() {
        let data = "ID,Code,Skill,Category,Level 1,Level 1 description\n\
                    1,ARCH,Architecture,Technical\n\
                    2,PROG,Programming,Development,Follow,Writes code.,stray\n";
        let rows = parse_sfia_csv(data.as_bytes()).expect("short rows accepted");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].code(), "ARCH");
        assert_eq!(rows[0].get("Category"), "Technical");
        assert_eq!(rows[0].get("Level 1"), "");
        assert_eq!(rows[0].level_description(1), "");
        assert_eq!(rows[1].level_description(1), "Writes code.");
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let dir = TempDir::new().expect("tempdir");
        let source = FileSource::new(FilePaths::in_dir(dir.path()));
        let err = source.read_roles().await.expect_err("no roles.json");
        assert!(format!("{err:#}").contains("roles.json"));
    }

    #[tokio::test]
    async fn reads_level_definitions() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("levels.json");
        std::fs::write(&path, r#"{"levels": [{"level": 1, "level_desc": "Follow"}]}"#)?;
        let defs = read_level_definitions(&path).await?;
        assert_eq!(defs.levels.len(), 1);
        assert_eq!(defs.levels[0].level_desc, "Follow");
        Ok(())
    }
}
