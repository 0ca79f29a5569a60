//! Relational backend over the `careers` schema.
//!
//! Each logical read borrows one pooled connection for its queries and gives
//! it back when the read finishes, successfully or not. Role tables are
//! reassembled into the same loose document `roles.json` holds, so the
//! normalizer sees one shape regardless of backend.

use crate::catalog::model::{
    COLUMN_CATEGORY, COLUMN_CODE, COLUMN_GUIDANCE_NOTES, COLUMN_ID, COLUMN_OVERALL_DESCRIPTION,
    COLUMN_SKILL, COLUMN_SUBCATEGORY, level_description_column, level_label_column,
};
use crate::catalog::{
    LEVELS, LevelDefinitions, Pathway, PathwayId, RawRole, RawRolesDocument, RoleId, SfiaRow,
};
use crate::config::{DatabaseSettings, RoleTableLayout, SourceMode};
use crate::error::CatalogError;
use crate::sources::{CatalogSource, read_level_definitions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Number, Value, json};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

const MAX_CONNECTIONS: u32 = 5;

const PATHWAYS_SQL: &str = "SELECT id::text AS id, description::text AS description \
     FROM careers.pathways ORDER BY pathways.id";
const ROLES_SQL: &str = "SELECT id::text AS id, name::text AS name FROM careers.roles ORDER BY roles.id";
const ROLE_LEVELS_SQL: &str = "SELECT role_id::text AS role_id, pathway_id::text AS pathway_id, \
     level::int4 AS level, title::text AS title \
     FROM careers.role_levels \
     ORDER BY role_levels.role_id, role_levels.pathway_id, role_levels.level";
const COMPETENCIES_SQL: &str = "SELECT role_id::text AS role_id, pathway_id::text AS pathway_id, \
     level::int4 AS level, skill_id::text AS skill_id, competency_level::text AS level_value \
     FROM careers.role_level_competencies \
     ORDER BY role_level_competencies.role_id, role_level_competencies.pathway_id, \
     role_level_competencies.level, role_level_competencies.skill_id";
const PATHWAY_SELECTIONS_SQL: &str = "SELECT role_id::text AS role_id, \
     pathway_id::text AS pathway_id, skill_id::text AS skill_id \
     FROM careers.role_pathway_selected_skills \
     ORDER BY role_pathway_selected_skills.role_id, role_pathway_selected_skills.pathway_id, \
     role_pathway_selected_skills.skill_id";
const LEVEL_SELECTIONS_SQL: &str = "SELECT role_id::text AS role_id, pathway_id::text AS pathway_id, \
     level::int4 AS level, skill_id::text AS skill_id, required_level::text AS level_value \
     FROM careers.role_level_selected_skills \
     ORDER BY role_level_selected_skills.role_id, role_level_selected_skills.pathway_id, \
     role_level_selected_skills.level, role_level_selected_skills.skill_id";

/// Reads roles and SFIA rows from Postgres; level definitions stay on disk.
#[derive(Clone, Debug)]
pub struct PgSource {
    pool: PgPool,
    role_tables: RoleTableLayout,
    levels_json: PathBuf,
}

impl PgSource {
    /// Build a pool that connects on first use. Must be called within a
    /// tokio runtime.
    pub fn connect_lazy(
        settings: &DatabaseSettings,
        role_tables: RoleTableLayout,
        levels_json: PathBuf,
    ) -> Result<Self, CatalogError> {
        let options = settings.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_lazy_with(options);
        Ok(Self {
            pool,
            role_tables,
            levels_json,
        })
    }

    async fn connection(&self) -> Result<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context("acquiring postgres connection")
    }
}

async fn fetch(conn: &mut PoolConnection<Postgres>, sql: &'static str) -> Result<Vec<PgRow>> {
    sqlx::query(sql)
        .fetch_all(&mut **conn)
        .await
        .with_context(|| format!("running query: {sql}"))
}

fn text(row: &PgRow, column: &str) -> Result<String> {
    row.try_get::<String, _>(column)
        .with_context(|| format!("reading column {column}"))
}

fn optional_text(row: &PgRow, column: &str) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(column)
        .with_context(|| format!("reading column {column}"))
}

fn level(row: &PgRow) -> Result<i32> {
    row.try_get::<i32, _>("level").context("reading column level")
}

#[async_trait]
impl CatalogSource for PgSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Db
    }

    async fn read_sfia_rows(&self) -> Result<Vec<SfiaRow>> {
        let columns = sfia_columns();
        let select = columns
            .iter()
            .map(|(db, _)| format!("{db}::text AS {db}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM careers.sfia_skill \
             ORDER BY sfia_skill.id NULLS LAST, sfia_skill.code"
        );

        let mut conn = self.connection().await?;
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .context("querying careers.sfia_skill")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut fields = BTreeMap::new();
            for (db, csv) in &columns {
                let value = optional_text(row, db)?.unwrap_or_default();
                fields.insert(csv.clone(), value);
            }
            out.push(SfiaRow::new(fields));
        }
        debug!(rows = out.len(), "read SFIA rows from postgres");
        Ok(out)
    }

    async fn read_roles(&self) -> Result<RawRolesDocument> {
        let mut conn = self.connection().await?;

        let pathways = fetch(&mut conn, PATHWAYS_SQL)
            .await?
            .iter()
            .map(|row| -> Result<PathwayRow> {
                Ok(PathwayRow {
                    id: text(row, "id")?,
                    description: optional_text(row, "description")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let roles = fetch(&mut conn, ROLES_SQL)
            .await?
            .iter()
            .map(|row| -> Result<RoleRow> {
                Ok(RoleRow {
                    id: text(row, "id")?,
                    name: optional_text(row, "name")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let role_levels = fetch(&mut conn, ROLE_LEVELS_SQL)
            .await?
            .iter()
            .map(|row| -> Result<RoleLevelRow> {
                Ok(RoleLevelRow {
                    role_id: text(row, "role_id")?,
                    pathway_id: text(row, "pathway_id")?,
                    level: level(row)?,
                    title: optional_text(row, "title")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let requirements = match self.role_tables {
            RoleTableLayout::Competencies => {
                let competencies = competency_rows(fetch(&mut conn, COMPETENCIES_SQL).await?)?;
                let selections = fetch(&mut conn, PATHWAY_SELECTIONS_SQL)
                    .await?
                    .iter()
                    .map(|row| -> Result<PathwaySelectionRow> {
                        Ok(PathwaySelectionRow {
                            role_id: text(row, "role_id")?,
                            pathway_id: text(row, "pathway_id")?,
                            skill_id: text(row, "skill_id")?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                RequirementRows::Competencies {
                    competencies,
                    selections,
                }
            }
            RoleTableLayout::SelectedSkills => RequirementRows::SelectedSkills(competency_rows(
                fetch(&mut conn, LEVEL_SELECTIONS_SQL).await?,
            )?),
        };

        debug!(
            pathways = pathways.len(),
            roles = roles.len(),
            "read role tables from postgres"
        );
        Ok(assemble_roles(RoleTableRows {
            pathways,
            roles,
            role_levels,
            requirements,
        }))
    }

    async fn read_level_definitions(&self) -> Result<LevelDefinitions> {
        read_level_definitions(&self.levels_json).await
    }
}

fn competency_rows(rows: Vec<PgRow>) -> Result<Vec<CompetencyRow>> {
    rows.iter()
        .map(|row| -> Result<CompetencyRow> {
            Ok(CompetencyRow {
                role_id: text(row, "role_id")?,
                pathway_id: text(row, "pathway_id")?,
                level: level(row)?,
                skill_id: text(row, "skill_id")?,
                level_value: optional_text(row, "level_value")?,
            })
        })
        .collect()
}

/// `(table column, CSV header)` pairs for `careers.sfia_skill`.
fn sfia_columns() -> Vec<(String, String)> {
    let mut columns = vec![
        ("id".to_string(), COLUMN_ID.to_string()),
        ("code".to_string(), COLUMN_CODE.to_string()),
        ("skill".to_string(), COLUMN_SKILL.to_string()),
        ("category".to_string(), COLUMN_CATEGORY.to_string()),
        ("subcategory".to_string(), COLUMN_SUBCATEGORY.to_string()),
        (
            "overall_description".to_string(),
            COLUMN_OVERALL_DESCRIPTION.to_string(),
        ),
        ("guidance_notes".to_string(), COLUMN_GUIDANCE_NOTES.to_string()),
    ];
    for level in LEVELS {
        columns.push((format!("level_{level}"), level_label_column(level)));
        columns.push((
            format!("level_{level}_description"),
            level_description_column(level),
        ));
    }
    columns
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathwayRow {
    pub id: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoleRow {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoleLevelRow {
    pub role_id: String,
    pub pathway_id: String,
    pub level: i32,
    pub title: Option<String>,
}

/// A required level for one skill at one role level, as stored text.
#[derive(Clone, Debug, PartialEq)]
pub struct CompetencyRow {
    pub role_id: String,
    pub pathway_id: String,
    pub level: i32,
    pub skill_id: String,
    pub level_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathwaySelectionRow {
    pub role_id: String,
    pub pathway_id: String,
    pub skill_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequirementRows {
    /// `role_level_competencies` plus `role_pathway_selected_skills`.
    Competencies {
        competencies: Vec<CompetencyRow>,
        selections: Vec<PathwaySelectionRow>,
    },
    /// `role_level_selected_skills`.
    SelectedSkills(Vec<CompetencyRow>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoleTableRows {
    pub pathways: Vec<PathwayRow>,
    pub roles: Vec<RoleRow>,
    pub role_levels: Vec<RoleLevelRow>,
    pub requirements: RequirementRows,
}

/// Rebuild the `roles.json` shape from role table rows.
///
/// Every role gets an (initially empty) block per pathway, level blocks
/// default their title to `""`, and rows for unknown roles are ignored.
pub fn assemble_roles(rows: RoleTableRows) -> RawRolesDocument {
    let mut roles: Vec<RawRole> = rows
        .roles
        .into_iter()
        .map(|row| RawRole {
            id: RoleId(row.id),
            name: row.name.unwrap_or_default(),
            blocks: rows
                .pathways
                .iter()
                .map(|p| (p.id.clone(), Value::Object(Map::new())))
                .collect(),
        })
        .collect();
    let position: HashMap<String, usize> = roles
        .iter()
        .enumerate()
        .map(|(idx, role)| (role.id.0.clone(), idx))
        .collect();

    if let RequirementRows::Competencies { selections, .. } = &rows.requirements {
        for row in selections {
            let Some(block) = pathway_block(&mut roles, &position, &row.role_id, &row.pathway_id) else {
                continue;
            };
            let list = block
                .entry("selected_skills")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                items.push(Value::String(row.skill_id.clone()));
            }
        }
    }

    for row in &rows.role_levels {
        let Some(block) = pathway_block(&mut roles, &position, &row.role_id, &row.pathway_id) else {
            continue;
        };
        block.insert(
            row.level.to_string(),
            json!({"title": row.title.clone().unwrap_or_default()}),
        );
    }

    let (requirements, as_list) = match &rows.requirements {
        RequirementRows::Competencies { competencies, .. } => (competencies, false),
        RequirementRows::SelectedSkills(selected) => (selected, true),
    };
    for row in requirements {
        let Some(block) = pathway_block(&mut roles, &position, &row.role_id, &row.pathway_id) else {
            continue;
        };
        let level = block
            .entry(row.level.to_string())
            .or_insert_with(|| json!({"title": ""}));
        let Value::Object(level) = level else {
            continue;
        };
        let value = level_value(row.level_value.as_deref());
        if as_list {
            let list = level
                .entry("selected_skills")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                items.push(json!({"skill_id": row.skill_id, "required_level": value}));
            }
        } else {
            level.insert(row.skill_id.clone(), value);
        }
    }

    RawRolesDocument {
        pathways: rows
            .pathways
            .into_iter()
            .map(|row| Pathway {
                id: PathwayId(row.id),
                description: row.description.unwrap_or_default(),
            })
            .collect(),
        roles,
    }
}

/// The role's block for `pathway_id`, created (or reset) as an object when needed.
fn pathway_block<'a>(
    roles: &'a mut [RawRole],
    position: &HashMap<String, usize>,
    role_id: &str,
    pathway_id: &str,
) -> Option<&'a mut Map<String, Value>> {
    let role = roles.get_mut(*position.get(role_id)?)?;
    let block = role
        .blocks
        .entry(pathway_id.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !block.is_object() {
        *block = Value::Object(Map::new());
    }
    block.as_object_mut()
}

/// Stored level text as JSON: numbers when they parse, the raw text otherwise.
fn level_value(raw: Option<&str>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_roles_document;

    fn base_rows(requirements: RequirementRows) -> RoleTableRows {
        RoleTableRows {
            pathways: vec![PathwayRow {
                id: "ic".into(),
                description: Some("Individual contributor".into()),
            }],
            roles: vec![RoleRow {
                id: "dev".into(),
                name: Some("Developer".into()),
            }],
            role_levels: vec![RoleLevelRow {
                role_id: "dev".into(),
                pathway_id: "ic".into(),
                level: 1,
                title: None,
            }],
            requirements,
        }
    }

    fn competency(level: i32, skill: &str, value: &str) -> CompetencyRow {
        CompetencyRow {
            role_id: "dev".into(),
            pathway_id: "ic".into(),
            level,
            skill_id: skill.into(),
            level_value: Some(value.into()),
        }
    }

    #[test]
    fn competency_tables_match_flat_json() {
        let assembled = assemble_roles(base_rows(RequirementRows::Competencies {
            competencies: vec![competency(1, "PROG", "2"), competency(2, "TEST", "3.0")],
            selections: vec![PathwaySelectionRow {
                role_id: "ghost".into(),
                pathway_id: "ic".into(),
                skill_id: "PROG".into(),
            }],
        }));
        let expected = parse_roles_document(
            r#"{
                "pathways": [{"id": "ic", "description": "Individual contributor"}],
                "roles": [{"id": "dev", "name": "Developer", "ic": {
                    "1": {"title": "", "PROG": 2},
                    "2": {"title": "", "TEST": 3.0}
                }}]
            }"#,
        )
        .unwrap();
        assert_eq!(assembled, expected);
    }

    #[test]
    fn selected_skill_table_builds_level_lists() {
        let mut rows = base_rows(RequirementRows::SelectedSkills(vec![
            competency(1, "PROG", "2"),
            competency(1, "TEST", "expert"),
        ]));
        rows.role_levels[0].title = Some("Junior".into());
        let assembled = assemble_roles(rows);
        let block = assembled.roles[0].blocks.get("ic").unwrap();
        assert_eq!(
            block,
            &json!({"1": {"title": "Junior", "selected_skills": [
                {"skill_id": "PROG", "required_level": 2},
                {"skill_id": "TEST", "required_level": "expert"}
            ]}})
        );
    }

    #[test]
    fn pathway_selections_become_a_list() {
        let assembled = assemble_roles(base_rows(RequirementRows::Competencies {
            competencies: Vec::new(),
            selections: vec![
                PathwaySelectionRow {
                    role_id: "dev".into(),
                    pathway_id: "ic".into(),
                    skill_id: "ARCH".into(),
                },
                PathwaySelectionRow {
                    role_id: "dev".into(),
                    pathway_id: "ic".into(),
                    skill_id: "PROG".into(),
                },
            ],
        }));
        assert_eq!(
            assembled.roles[0].blocks.get("ic").and_then(|b| b.get("selected_skills")),
            Some(&json!(["ARCH", "PROG"]))
        );
    }

    #[test]
    fn level_text_is_coerced_when_numeric() {
        assert_eq!(level_value(Some("4")), json!(4));
        assert_eq!(level_value(Some(" 2.5 ")), json!(2.5));
        assert_eq!(level_value(Some("high")), json!("high"));
        assert_eq!(level_value(None), Value::Null);
    }

    #[test]
    fn sfia_columns_map_back_to_csv_headers() {
        let columns = sfia_columns();
        assert_eq!(columns.len(), 7 + 14);
        assert!(columns.contains(&("level_3".to_string(), "Level 3".to_string())));
        assert!(columns.contains(&(
            "level_7_description".to_string(),
            "Level 7 description".to_string()
        )));
    }
}
