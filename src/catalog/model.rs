//! Typed representation of the careers catalog documents.
//!
//! `Skills` and `Roles` are the canonical, normalized documents handed to the
//! presentation layer. `SfiaRow` keeps a raw CSV row as-is (column name to
//! text) so the SFIA views can show the source verbatim. `RawRolesDocument`
//! is the loosely-typed shape both role backends produce before
//! normalization; see `crate::normalize` for the conversion.

use crate::catalog::identity::{CategoryId, LevelValue, PathwayId, RoleId, SkillId};
use crate::schema_loader::{DocumentKind, check_document};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const COLUMN_ID: &str = "ID";
pub const COLUMN_CODE: &str = "Code";
pub const COLUMN_SKILL: &str = "Skill";
pub const COLUMN_CATEGORY: &str = "Category";
pub const COLUMN_SUBCATEGORY: &str = "Subcategory";
pub const COLUMN_OVERALL_DESCRIPTION: &str = "Overall description";
pub const COLUMN_GUIDANCE_NOTES: &str = "Guidance notes";

/// Column holding the short label for `level` (`Level 3`).
pub fn level_label_column(level: u8) -> String {
    format!("Level {level}")
}

/// Column holding the long-form text for `level` (`Level 3 description`).
pub fn level_description_column(level: u8) -> String {
    format!("Level {level} description")
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// Global level definition, kept verbatim apart from level number coercion.
pub struct LevelDescriptor {
    pub level: LevelValue,
    #[serde(default)]
    pub level_desc: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkillLevel {
    pub level: u8,
    pub brief_description: String,
    pub full_description: String,
    /// Set when the description was backfilled or already carried the AI marker.
    pub is_ai: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub category_id: CategoryId,
    pub subcategory: String,
    pub levels: Vec<SkillLevel>,
}

impl Skill {
    pub fn level(&self, level: u8) -> Option<&SkillLevel> {
        self.levels.iter().find(|lvl| lvl.level == level)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
/// Canonical skills document: sorted categories, level definitions, sorted skills.
pub struct Skills {
    pub categories: Vec<Category>,
    pub levels: Vec<LevelDescriptor>,
    pub skills: Vec<Skill>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: PathwayId,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// One skill a role level asks for, with the proficiency it expects.
pub struct SkillRequirement {
    pub skill_id: SkillId,
    pub required_level: LevelValue,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
/// A role's expectations at one level of one pathway.
///
/// Both historical encodings (flat `skill_id: level` keys and a
/// `selected_skills` list) normalize into `selected_skills`. A list keeps its
/// source order; flat keys come out sorted by skill id.
pub struct LevelBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub selected_skills: Vec<SkillRequirement>,
    /// Structural problems found while normalizing; reported as validation errors.
    #[serde(skip)]
    pub defects: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PathwayProgression {
    /// Pathway-wide skill shortlist, when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_skills: Option<Vec<SkillId>>,
    #[serde(flatten)]
    pub levels: BTreeMap<u8, LevelBlock>,
    #[serde(skip)]
    pub defects: Vec<String>,
}

impl PathwayProgression {
    pub fn level(&self, level: u8) -> Option<&LevelBlock> {
        self.levels.get(&level)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(flatten)]
    pub pathways: BTreeMap<PathwayId, PathwayProgression>,
}

impl Role {
    pub fn pathway(&self, id: &PathwayId) -> Option<&PathwayProgression> {
        self.pathways.get(id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Roles {
    pub pathways: Vec<Pathway>,
    pub roles: Vec<Role>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
/// One row of the SFIA skill matrix, keyed by CSV column name.
pub struct SfiaRow {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    /// Levels whose description was backfilled rather than read from the source.
    #[serde(rename = "__ai", skip_serializing_if = "BTreeSet::is_empty")]
    pub ai_levels: BTreeSet<u8>,
}

impl SfiaRow {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self {
            fields,
            ai_levels: BTreeSet::new(),
        }
    }

    /// Trimmed value of `column`, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(|v| v.trim()).unwrap_or_default()
    }

    pub fn code(&self) -> &str {
        self.get(COLUMN_CODE)
    }

    pub fn level_label(&self, level: u8) -> &str {
        self.get(&level_label_column(level))
    }

    pub fn level_description(&self, level: u8) -> &str {
        self.get(&level_description_column(level))
    }

    /// Record backfilled text for `level` and flag it as AI-sourced.
    pub fn set_ai_description(&mut self, level: u8, text: &str) {
        self.fields
            .insert(level_description_column(level), text.to_string());
        self.ai_levels.insert(level);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
/// Role document as read from `roles.json` or assembled from the database.
pub struct RawRolesDocument {
    #[serde(default)]
    pub pathways: Vec<Pathway>,
    #[serde(default)]
    pub roles: Vec<RawRole>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawRole {
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
    /// Everything else on the role; pathway blocks live under their pathway id.
    #[serde(flatten)]
    pub blocks: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LevelDefinitions {
    #[serde(default)]
    pub levels: Vec<LevelDescriptor>,
}

/// Parse `roles.json` after checking its structure.
pub fn parse_roles_document(data: &str) -> Result<RawRolesDocument> {
    let value: Value = serde_json::from_str(data).context("parsing roles document")?;
    check_document(DocumentKind::Roles, &value)?;
    serde_json::from_value(value).context("decoding roles document")
}

/// Parse `sfia_levels.json` after checking its structure.
pub fn parse_level_definitions(data: &str) -> Result<LevelDefinitions> {
    let value: Value = serde_json::from_str(data).context("parsing level definitions")?;
    check_document(DocumentKind::LevelDefinitions, &value)?;
    serde_json::from_value(value).context("decoding level definitions")
}
