use anyhow::{Context, Result};
use careers_catalog::{CatalogStore, StoreConfig};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SFIA_COLUMNS_HEAD: [&str; 5] = ["ID", "Category", "Subcategory", "Code", "Skill"];

/// Full header row of the SFIA export, in file order.
pub fn sfia_headers() -> Vec<String> {
    let mut headers: Vec<String> = SFIA_COLUMNS_HEAD.iter().map(|h| h.to_string()).collect();
    headers.extend((1..=7).map(|n| format!("Level {n}")));
    headers.extend((1..=7).map(|n| format!("Level {n} description")));
    headers.push("Overall description".into());
    headers.push("Guidance notes".into());
    headers
}

/// One CSV row; unspecified columns are written empty.
#[derive(Clone, Debug, Default)]
pub struct CsvRow(BTreeMap<String, String>);

impl CsvRow {
    pub fn skill(code: &str, name: &str, category: &str) -> Self {
        Self::default()
            .set("Code", code)
            .set("Skill", name)
            .set("Category", category)
    }

    pub fn set(mut self, column: &str, value: &str) -> Self {
        self.0.insert(column.to_string(), value.to_string());
        self
    }

    pub fn level(self, level: u8, label: &str, description: &str) -> Self {
        self.set(&format!("Level {level}"), label)
            .set(&format!("Level {level} description"), description)
    }
}

/// A temporary data directory laid out like the real one.
pub struct DataDir {
    dir: TempDir,
}

impl DataDir {
    pub fn new() -> Result<Self> {
        let data = Self {
            dir: TempDir::new().context("allocating data dir")?,
        };
        data.write_levels(&default_levels())?;
        Ok(data)
    }

    /// Standard fixture: four skills, one fully specified role.
    pub fn standard() -> Result<Self> {
        let data = Self::new()?;
        data.write_sfia(&standard_rows())?;
        data.write_roles(&standard_roles())?;
        Ok(data)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::for_data_dir(self.path())
    }

    pub fn store(&self) -> Result<CatalogStore> {
        Ok(CatalogStore::new(&self.config())?)
    }

    pub fn write_sfia(&self, rows: &[CsvRow]) -> Result<()> {
        let headers = sfia_headers();
        let mut writer = csv::Writer::from_path(self.config().files.sfia_csv)
            .context("creating SFIA csv")?;
        writer.write_record(&headers)?;
        for row in rows {
            writer.write_record(
                headers
                    .iter()
                    .map(|h| row.0.get(h).map(String::as_str).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_roles(&self, roles: &Value) -> Result<()> {
        self.write_json(&self.config().files.roles_json, roles)
    }

    pub fn write_levels(&self, levels: &Value) -> Result<()> {
        self.write_json(&self.config().files.levels_json, levels)
    }

    pub fn write_overlay(&self, overlay: &Value) -> Result<()> {
        self.write_json(&self.config().files.ai_descriptions, overlay)
    }

    pub fn write_raw(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn write_json(&self, path: &Path, value: &Value) -> Result<()> {
        let rendered = serde_json::to_string_pretty(value)?;
        self.write_raw(path, &rendered)
    }
}

pub fn default_levels() -> Value {
    json!({
        "levels": (1..=7)
            .map(|n| json!({"level": n, "level_name": format!("L{n}"), "level_desc": format!("Generic intent for level {n}.")}))
            .collect::<Vec<_>>()
    })
}

pub fn standard_rows() -> Vec<CsvRow> {
    let mut prog = CsvRow::skill("PROG", "Programming", "Development");
    for level in 1..=7u8 {
        prog = prog.level(level, "", &format!("  Programs at level {level}.  "));
    }
    vec![
        CsvRow::skill("ARCH", "Architecture", "Technical")
            .set("ID", "1")
            .level(2, "Assist", "Helps document designs.")
            .level(3, "", "")
            .level(5, "5", "Leads architecture work."),
        prog.set("ID", "2"),
        CsvRow::skill("BUAN", "Business analysis", "Business Change").set("ID", "3"),
        CsvRow::skill("BPRE", "Process improvement", "Business Change").set("ID", "4"),
    ]
}

/// A pathway block with a title and `requirements` at every level.
pub fn full_pathway(requirements: Value) -> Value {
    let mut block = serde_json::Map::new();
    for level in 1..=7 {
        let mut entry = requirements.clone();
        entry["title"] = json!(format!("Engineer {level}"));
        block.insert(level.to_string(), entry);
    }
    Value::Object(block)
}

pub fn standard_roles() -> Value {
    json!({
        "pathways": [
            {"id": "ic", "description": "Individual contributor"}
        ],
        "roles": [
            {"id": "dev", "name": "Developer", "ic": full_pathway(json!({"PROG": 3, "ARCH": "2"}))}
        ]
    })
}
