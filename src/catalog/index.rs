//! Lookup tables derived from the canonical documents.
//!
//! Every table is rebuilt wholesale from its document; nothing is patched in
//! place. Building twice from the same documents yields equal tables, which
//! the store relies on when it swaps a single table group after a reload.

use crate::catalog::identity::{CategoryId, LevelValue, PathwayId, RoleId, SkillId};
use crate::catalog::model::{
    Category, LevelBlock, LevelDescriptor, Pathway, Role, Roles, SfiaRow, Skill, SkillLevel,
    Skills,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
/// Tables over the skills document.
pub struct SkillIndexes {
    pub categories_by_id: BTreeMap<CategoryId, Category>,
    /// Level definitions keyed by their coerced number; unreadable levels are left out.
    pub level_by_number: BTreeMap<i64, LevelDescriptor>,
    pub skills_by_id: BTreeMap<SkillId, Skill>,
    /// Skill ids per category, in document order.
    pub skills_by_category_id: BTreeMap<CategoryId, Vec<SkillId>>,
}

impl SkillIndexes {
    pub fn build(skills: &Skills) -> Self {
        let mut index = Self::default();
        for category in &skills.categories {
            index
                .categories_by_id
                .insert(category.id.clone(), category.clone());
        }
        for descriptor in &skills.levels {
            if let LevelValue::Number(n) = descriptor.level {
                index.level_by_number.insert(n, descriptor.clone());
            }
        }
        for skill in &skills.skills {
            if skill.id.0.is_empty() {
                continue;
            }
            index
                .skills_by_category_id
                .entry(skill.category_id.clone())
                .or_default()
                .push(skill.id.clone());
            index.skills_by_id.insert(skill.id.clone(), skill.clone());
        }
        index
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Tables over the roles document.
pub struct RoleIndexes {
    pub pathways_by_id: BTreeMap<PathwayId, Pathway>,
    pub roles_by_id: BTreeMap<RoleId, Role>,
}

impl RoleIndexes {
    pub fn build(roles: &Roles) -> Self {
        let pathways_by_id = roles
            .pathways
            .iter()
            .filter(|p| !p.id.0.is_empty())
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        let roles_by_id = roles
            .roles
            .iter()
            .filter(|r| !r.id.0.is_empty())
            .map(|r| (r.id.clone(), r.clone()))
            .collect();
        Self {
            pathways_by_id,
            roles_by_id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Raw SFIA rows keyed by trimmed `Code`; rows without a code are not indexed.
pub struct SfiaIndex {
    pub by_code: BTreeMap<String, SfiaRow>,
}

impl SfiaIndex {
    pub fn build(rows: &[SfiaRow]) -> Self {
        let by_code = rows
            .iter()
            .filter(|row| !row.code().is_empty())
            .map(|row| (row.code().to_string(), row.clone()))
            .collect();
        Self { by_code }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// The seven lookup tables, grouped by the document they derive from.
///
/// Groups are reference counted so a reload of one source replaces only its
/// own group and readers holding an older `IndexSet` keep a consistent view.
pub struct IndexSet {
    pub skills: Arc<SkillIndexes>,
    pub roles: Arc<RoleIndexes>,
    pub sfia: Arc<SfiaIndex>,
}

impl IndexSet {
    pub fn build(skills: &Skills, roles: &Roles, sfia_rows: &[SfiaRow]) -> Self {
        Self {
            skills: Arc::new(SkillIndexes::build(skills)),
            roles: Arc::new(RoleIndexes::build(roles)),
            sfia: Arc::new(SfiaIndex::build(sfia_rows)),
        }
    }

    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.skills.categories_by_id.get(id)
    }

    pub fn level_definition(&self, level: u8) -> Option<&LevelDescriptor> {
        self.skills.level_by_number.get(&i64::from(level))
    }

    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.skills_by_id.get(id)
    }

    /// Skills filed under `category`, resolved in document order.
    pub fn skills_in_category(&self, category: &CategoryId) -> Vec<&Skill> {
        self.skills
            .skills_by_category_id
            .get(category)
            .map(|ids| ids.iter().filter_map(|id| self.skill(id)).collect())
            .unwrap_or_default()
    }

    pub fn skill_level(&self, id: &SkillId, level: u8) -> Option<&SkillLevel> {
        self.skill(id)?.level(level)
    }

    pub fn pathway(&self, id: &PathwayId) -> Option<&Pathway> {
        self.roles.pathways_by_id.get(id)
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.roles_by_id.get(id)
    }

    /// A role's block for one pathway level. The pathway must be declared.
    pub fn role_level(&self, role: &RoleId, pathway: &PathwayId, level: u8) -> Option<&LevelBlock> {
        self.pathway(pathway)?;
        self.role(role)?.pathway(pathway)?.level(level)
    }

    pub fn sfia_row(&self, code: &str) -> Option<&SfiaRow> {
        self.sfia.by_code.get(code.trim())
    }
}
