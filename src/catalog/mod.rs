//! Careers catalog documents and their lookup tables.
//!
//! `model` mirrors the canonical `Skills`/`Roles` documents and the raw shapes
//! the sources produce; `identity` holds the id newtypes and level coercion;
//! `index` derives the lookup tables consumers query through `IndexSet`.

pub mod identity;
pub mod index;
pub mod model;

pub use identity::{
    CategoryId, LEVELS, LevelValue, PathwayId, RoleId, SkillId, parse_level_id,
};
pub use index::{IndexSet, RoleIndexes, SfiaIndex, SkillIndexes};
pub use model::{
    Category, LevelBlock, LevelDefinitions, LevelDescriptor, Pathway, PathwayProgression,
    RawRole, RawRolesDocument, Role, Roles, SfiaRow, Skill, SkillLevel, SkillRequirement, Skills,
    parse_level_definitions, parse_roles_document,
};
