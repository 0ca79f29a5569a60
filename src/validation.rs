//! Referential and range checks across the loaded documents.
//!
//! Validation never stops at the first problem: every error and warning is
//! collected so a strict load can report the full defect list in one failure.

use crate::catalog::{IndexSet, LEVELS, PathwayProgression, Role, Roles, SkillId, Skills};
use crate::error::AggregateValidationError;
use std::collections::BTreeSet;
use tracing::{error, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Log the findings and, when `strict`, turn any error into a failure.
    ///
    /// Warnings are always logged. Errors are logged instead of returned when
    /// not strict, and the report is handed back either way.
    pub fn into_result(self, strict: bool) -> Result<Self, AggregateValidationError> {
        if !self.warnings.is_empty() {
            warn!(
                count = self.warnings.len(),
                "catalog data warnings:\n{}",
                bullet_list(&self.warnings)
            );
        }
        if self.errors.is_empty() {
            return Ok(self);
        }
        if strict {
            return Err(AggregateValidationError {
                errors: self.errors,
            });
        }
        error!(
            count = self.errors.len(),
            "catalog data errors:\n{}",
            bullet_list(&self.errors)
        );
        Ok(self)
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check `skills` and `roles` against each other using freshly built `indexes`.
pub fn validate_catalog(skills: &Skills, roles: &Roles, indexes: &IndexSet) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_skills(skills, indexes, &mut report);
    for role in &roles.roles {
        validate_role(role, roles, indexes, &mut report);
    }
    report
}

fn validate_skills(skills: &Skills, indexes: &IndexSet, report: &mut ValidationReport) {
    let mut seen = BTreeSet::new();
    for skill in &skills.skills {
        if !seen.insert(&skill.id) {
            report
                .warnings
                .push(format!("Duplicate skill id {}", skill.id));
        }
        if indexes.category(&skill.category_id).is_none() {
            report.warnings.push(format!(
                "Skill {} references missing category {}",
                skill.id, skill.category_id
            ));
        }
        for level in &skill.levels {
            if !LEVELS.contains(&level.level) {
                report
                    .errors
                    .push(format!("Skill {} has invalid level {}", skill.id, level.level));
            }
        }
    }
}

fn validate_role(role: &Role, roles: &Roles, indexes: &IndexSet, report: &mut ValidationReport) {
    for pathway in &roles.pathways {
        let prefix = format!("Role {} pathway {}", role.id, pathway.id);
        let Some(progression) = role.pathway(&pathway.id) else {
            report
                .errors
                .push(format!("Role {} missing pathway {}", role.id, pathway.id));
            continue;
        };

        for defect in &progression.defects {
            report.errors.push(format!("{prefix} {defect}"));
        }
        validate_pathway_selection(&prefix, progression, indexes, report);

        for level in LEVELS {
            let Some(block) = progression.level(level) else {
                report.errors.push(format!("{prefix} missing level {level}"));
                continue;
            };
            let prefix = format!("{prefix} level {level}");
            if block.title.as_deref().is_none_or(|title| title.trim().is_empty()) {
                report.warnings.push(format!("{prefix} missing title"));
            }
            for defect in &block.defects {
                report.errors.push(format!("{prefix} {defect}"));
            }

            let mut selected = BTreeSet::new();
            for requirement in &block.selected_skills {
                let skill_id = &requirement.skill_id;
                if skill_id.0.trim().is_empty() {
                    report
                        .errors
                        .push(format!("{prefix} selected_skills contains invalid skill id"));
                    continue;
                }
                let first = selected.insert(skill_id);
                if !first {
                    report
                        .warnings
                        .push(format!("{prefix} selects duplicate skill {skill_id}"));
                }
                if indexes.skill(skill_id).is_none() {
                    if first {
                        report
                            .errors
                            .push(format!("{prefix} references unknown skill {skill_id}"));
                    }
                    continue;
                }
                if requirement.required_level.in_range().is_none() {
                    report.errors.push(format!(
                        "{prefix} has invalid competency for {skill_id}: {}",
                        requirement.required_level
                    ));
                }
            }
        }
    }
}

fn validate_pathway_selection(
    prefix: &str,
    progression: &PathwayProgression,
    indexes: &IndexSet,
    report: &mut ValidationReport,
) {
    let Some(selected) = &progression.selected_skills else {
        return;
    };
    let mut seen: BTreeSet<&SkillId> = BTreeSet::new();
    for skill_id in selected {
        if !seen.insert(skill_id) {
            report.warnings.push(format!(
                "{prefix} selected_skills contains duplicate {skill_id}"
            ));
        }
        if indexes.skill(skill_id).is_none() {
            report.errors.push(format!(
                "{prefix} selected_skills references unknown skill {skill_id}"
            ));
        }
    }
}
