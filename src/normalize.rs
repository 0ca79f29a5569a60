//! Conversion of raw source rows into the canonical `Skills` and `Roles` documents.
//!
//! Skills come from SFIA CSV rows plus the global level definitions, with
//! missing level descriptions backfilled from the AI overlay or, failing
//! that, a synthesized sentence. Roles come from either historical role
//! encoding and leave here in the single `LevelBlock::selected_skills` shape,
//! so indexing and validation never look at the source encoding again.

use crate::catalog::identity::{CategoryId, LEVELS, LevelValue, SkillId};
use crate::catalog::model::{
    COLUMN_CATEGORY, COLUMN_SKILL, COLUMN_SUBCATEGORY, Category, LevelBlock, LevelDescriptor,
    PathwayProgression, RawRolesDocument, Role, Roles, SfiaRow, Skill, SkillLevel,
    SkillRequirement, Skills,
};
use crate::sources::AiOverlay;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Prefix carried by every machine-generated description.
pub const AI_MARKER: &str = "AI created:";

const SELECTED_SKILLS_KEY: &str = "selected_skills";
const TITLE_KEY: &str = "title";

/// Output of skill normalization: the canonical document plus the SFIA rows
/// annotated with backfilled text and their `__ai` level markers.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSkills {
    pub skills: Skills,
    pub rows: Vec<SfiaRow>,
}

pub fn normalize_skills(
    rows: &[SfiaRow],
    levels: Vec<LevelDescriptor>,
    overlay: &AiOverlay,
) -> NormalizedSkills {
    let mut categories = CategoryRegistry::default();
    let mut skills = Vec::new();
    let mut annotated = Vec::with_capacity(rows.len());

    for row in rows {
        let mut out_row = row.clone();
        let code = row.code();
        if code.is_empty() {
            annotated.push(out_row);
            continue;
        }

        let category_id = categories.id_for(row.get(COLUMN_CATEGORY));
        let name = match row.get(COLUMN_SKILL) {
            "" => code.to_string(),
            skill => skill.to_string(),
        };

        let sourced = sourced_levels(row);
        let mut skill_levels = Vec::with_capacity(LEVELS.len());
        for level in LEVELS {
            let short = row.level_label(level);
            let brief = if short.is_empty() || short.chars().all(|c| c.is_ascii_digit()) {
                String::new()
            } else {
                short.to_string()
            };

            let primary = row.level_description(level);
            let (full_description, is_ai) = if !primary.is_empty() {
                if carries_ai_marker(primary) {
                    out_row.ai_levels.insert(level);
                    (canonical_ai_text(primary), true)
                } else {
                    (primary.to_string(), false)
                }
            } else {
                let text = match overlay.lookup(code, level) {
                    Some(text) => canonical_ai_text(text),
                    None => {
                        let descriptor = levels
                            .iter()
                            .find(|d| d.level == LevelValue::Number(i64::from(level)));
                        synthesize_description(&name, level, &sourced, descriptor)
                    }
                };
                out_row.set_ai_description(level, &text);
                (text, true)
            };

            skill_levels.push(SkillLevel {
                level,
                brief_description: brief,
                full_description,
                is_ai,
            });
        }

        skills.push(Skill {
            id: SkillId(code.to_string()),
            name,
            category_id,
            subcategory: row.get(COLUMN_SUBCATEGORY).to_string(),
            levels: skill_levels,
        });
        annotated.push(out_row);
    }

    let mut categories = categories.into_categories();
    categories.sort_by(|a, b| collate(&a.name, &b.name));
    skills.sort_by(|a, b| collate(&a.name, &b.name));

    NormalizedSkills {
        skills: Skills {
            categories,
            levels,
            skills,
        },
        rows: annotated,
    }
}

/// Category ids keyed by trimmed display name; the first name seen for an id wins.
#[derive(Default)]
struct CategoryRegistry {
    by_name: HashMap<String, CategoryId>,
    known: BTreeSet<CategoryId>,
    categories: Vec<Category>,
}

impl CategoryRegistry {
    fn id_for(&mut self, name: &str) -> CategoryId {
        let key = name.trim();
        if key.is_empty() {
            return CategoryId(CategoryId::UNKNOWN.to_string());
        }
        if let Some(id) = self.by_name.get(key) {
            return id.clone();
        }

        let id = CategoryId::from_name(key);
        self.by_name.insert(key.to_string(), id.clone());
        if id.0 != CategoryId::UNKNOWN && self.known.insert(id.clone()) {
            self.categories.push(Category {
                id: id.clone(),
                name: key.to_string(),
            });
        }
        id
    }

    fn into_categories(self) -> Vec<Category> {
        self.categories
    }
}

/// Case-insensitive ordering with a byte-order tie break, so equal keys stay deterministic.
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Levels whose description came from the primary source rather than a backfill.
fn sourced_levels(row: &SfiaRow) -> BTreeSet<u8> {
    LEVELS
        .filter(|level| {
            let text = row.level_description(*level);
            !text.is_empty() && !row.ai_levels.contains(level) && !carries_ai_marker(text)
        })
        .collect()
}

pub fn carries_ai_marker(text: &str) -> bool {
    strip_prefix_ignore_case(text.trim_start(), AI_MARKER).is_some()
}

/// Re-label AI text with exactly one marker and no leading `Level N (Name).` fragment.
pub fn canonical_ai_text(text: &str) -> String {
    let trimmed = text.trim();
    let body = strip_prefix_ignore_case(trimmed, AI_MARKER)
        .unwrap_or(trimmed)
        .trim_start();
    let body = strip_level_label(body);
    if body.is_empty() {
        AI_MARKER.to_string()
    } else {
        format!("{AI_MARKER} {body}")
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Drop a leading `Level 3`, `Level 3 (Apply)`, optionally followed by `.`, `:` or `-`.
fn strip_level_label(text: &str) -> &str {
    let Some(rest) = strip_prefix_ignore_case(text, "level") else {
        return text;
    };
    let rest = rest.trim_start();
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return text;
    }
    let mut rest = rest[digits..].trim_start();
    if let Some(after_open) = rest.strip_prefix('(') {
        match after_open.find(')') {
            Some(close) => rest = after_open[close + 1..].trim_start(),
            None => return text,
        }
    }
    for separator in ['.', ':', '-', '\u{2013}'] {
        if let Some(stripped) = rest.strip_prefix(separator) {
            rest = stripped;
            break;
        }
    }
    rest.trim_start()
}

/// Placeholder text for a level with no source or overlay description.
fn synthesize_description(
    skill_name: &str,
    level: u8,
    sourced: &BTreeSet<u8>,
    descriptor: Option<&LevelDescriptor>,
) -> String {
    let lower = sourced.range(..level).next_back();
    let upper = sourced.range(level + 1..).next();
    let basis = match (lower, upper) {
        (Some(lo), Some(hi)) => format!("extrapolating between levels {lo} and {hi}"),
        (Some(lo), None) => format!("extrapolating from level {lo}"),
        (None, Some(hi)) => format!("extrapolating towards level {hi}"),
        (None, None) => "using only generic level intent".to_string(),
    };

    let mut text = format!(
        "{AI_MARKER} {skill_name}. Expectations at level {level} are inferred by {basis}."
    );
    if let Some(desc) = descriptor
        .map(|d| d.level_desc.trim())
        .filter(|desc| !desc.is_empty())
    {
        text.push(' ');
        text.push_str(desc);
    }
    text
}

/// Normalize a raw role document into canonical `Roles`.
///
/// Only blocks keyed by a declared pathway are kept; anything that is not an
/// object where a block is expected is dropped here and reported by the
/// validator as missing.
pub fn normalize_roles(raw: RawRolesDocument) -> Roles {
    let roles = raw
        .roles
        .into_iter()
        .map(|role| {
            let mut pathways = BTreeMap::new();
            for pathway in &raw.pathways {
                if let Some(Value::Object(block)) = role.blocks.get(&pathway.id.0) {
                    pathways.insert(pathway.id.clone(), normalize_pathway(block));
                }
            }
            Role {
                id: role.id,
                name: role.name,
                pathways,
            }
        })
        .collect();

    Roles {
        pathways: raw.pathways,
        roles,
    }
}

fn normalize_pathway(block: &Map<String, Value>) -> PathwayProgression {
    let mut progression = PathwayProgression::default();

    match block.get(SELECTED_SKILLS_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str().map(str::trim) {
                    Some(id) if !id.is_empty() => ids.push(SkillId(id.to_string())),
                    _ => progression
                        .defects
                        .push("selected_skills contains invalid skill id".to_string()),
                }
            }
            progression.selected_skills = Some(ids);
        }
        Some(_) => progression
            .defects
            .push("selected_skills must be an array".to_string()),
    }

    for (key, value) in block {
        let Some(level) = level_key(key) else {
            continue;
        };
        if let Value::Object(level_block) = value {
            progression
                .levels
                .entry(level)
                .or_insert_with(|| RawLevelBlock::classify(level_block).into_block());
        }
    }
    progression
}

fn level_key(key: &str) -> Option<u8> {
    key.trim()
        .parse::<u8>()
        .ok()
        .filter(|level| LEVELS.contains(level))
}

/// The two historical encodings of a role level block.
enum RawLevelBlock<'a> {
    /// `{"title": .., "<skill id>": <level>, ..}`
    Competencies {
        title: Option<&'a Value>,
        entries: Vec<(&'a str, &'a Value)>,
    },
    /// `{"title": .., "selected_skills": [{"skill_id": .., "required_level": ..}]}`.
    /// Stray flat keys next to the list are still honored.
    Selected {
        title: Option<&'a Value>,
        selections: &'a Value,
        entries: Vec<(&'a str, &'a Value)>,
    },
}

impl<'a> RawLevelBlock<'a> {
    fn classify(block: &'a Map<String, Value>) -> Self {
        let title = block.get(TITLE_KEY);
        let entries = block
            .iter()
            .filter(|(key, _)| key.as_str() != TITLE_KEY && key.as_str() != SELECTED_SKILLS_KEY)
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        match block.get(SELECTED_SKILLS_KEY) {
            Some(selections) if !selections.is_null() => RawLevelBlock::Selected {
                title,
                selections,
                entries,
            },
            _ => RawLevelBlock::Competencies { title, entries },
        }
    }

    fn into_block(self) -> LevelBlock {
        let mut block = LevelBlock::default();
        let (title, entries) = match self {
            RawLevelBlock::Competencies { title, entries } => (title, entries),
            RawLevelBlock::Selected {
                title,
                selections,
                entries,
            } => {
                push_selections(&mut block, selections);
                (title, entries)
            }
        };

        block.title = match title {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        for (skill_id, value) in entries {
            block.selected_skills.push(SkillRequirement {
                skill_id: SkillId(skill_id.to_string()),
                required_level: LevelValue::from_value(value),
            });
        }
        block
    }
}

fn push_selections(block: &mut LevelBlock, selections: &Value) {
    let Value::Array(items) = selections else {
        block
            .defects
            .push("selected_skills must be an array".to_string());
        return;
    };

    for item in items {
        let Value::Object(entry) = item else {
            block
                .defects
                .push(format!("selected_skills contains invalid entry {item}"));
            continue;
        };
        let skill_id = entry
            .get("skill_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if skill_id.is_empty() {
            block
                .defects
                .push("selected_skills contains invalid skill id".to_string());
            continue;
        }
        block.selected_skills.push(SkillRequirement {
            skill_id: SkillId(skill_id.to_string()),
            required_level: LevelValue::from_value(
                entry.get("required_level").unwrap_or(&Value::Null),
            ),
        });
    }
}
