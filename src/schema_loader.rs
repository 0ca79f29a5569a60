//! Structural JSON Schema checks for the JSON sources.
//!
//! The schemas only pin the document skeleton (top-level keys, arrays of
//! objects carrying ids) so a truncated or mis-exported file fails at read
//! time. Referential integrity is left to `crate::validation`, which reports
//! every defect at once instead of the first one the schema engine finds.

use anyhow::{Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::{Value, json};
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DocumentKind {
    Roles,
    LevelDefinitions,
    AiOverlay,
}

impl DocumentKind {
    fn label(self) -> &'static str {
        match self {
            DocumentKind::Roles => "roles document",
            DocumentKind::LevelDefinitions => "level definitions",
            DocumentKind::AiOverlay => "AI descriptions overlay",
        }
    }

    fn schema(self) -> &'static Value {
        match self {
            DocumentKind::Roles => &ROLES_SCHEMA,
            DocumentKind::LevelDefinitions => &LEVELS_SCHEMA,
            DocumentKind::AiOverlay => &OVERLAY_SCHEMA,
        }
    }

    fn compiled(self) -> &'static Result<JSONSchema, String> {
        match self {
            DocumentKind::Roles => &COMPILED_ROLES,
            DocumentKind::LevelDefinitions => &COMPILED_LEVELS,
            DocumentKind::AiOverlay => &COMPILED_OVERLAY,
        }
    }
}

fn compile(kind: DocumentKind) -> Result<JSONSchema, String> {
    JSONSchema::compile(kind.schema())
        .map_err(|err| format!("compiling {} schema: {err}", kind.label()))
}

static COMPILED_ROLES: LazyLock<Result<JSONSchema, String>> =
    LazyLock::new(|| compile(DocumentKind::Roles));
static COMPILED_LEVELS: LazyLock<Result<JSONSchema, String>> =
    LazyLock::new(|| compile(DocumentKind::LevelDefinitions));
static COMPILED_OVERLAY: LazyLock<Result<JSONSchema, String>> =
    LazyLock::new(|| compile(DocumentKind::AiOverlay));

static ROLES_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["roles", "pathways"],
        "properties": {
            "pathways": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "description": {"type": "string"}
                    }
                }
            },
            "roles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {
                        "id": {"type": "string", "minLength": 1},
                        "name": {"type": "string"}
                    }
                }
            }
        }
    })
});

static LEVELS_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["levels"],
        "properties": {
            "levels": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["level"],
                    "properties": {
                        "level": {"type": ["integer", "string"]},
                        "level_desc": {"type": "string"}
                    }
                }
            }
        }
    })
});

static OVERLAY_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "required": ["descriptions"],
        "properties": {
            "generated_at": {"type": "string"},
            "source_file": {"type": "string"},
            "descriptions": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                }
            }
        }
    })
});

/// Validate `value` against the embedded schema for `kind`.
///
/// All schema violations are joined into one error so a broken export is
/// diagnosed in a single pass.
pub(crate) fn check_document(kind: DocumentKind, value: &Value) -> Result<()> {
    let compiled = kind.compiled().as_ref().map_err(|err| anyhow!("{err}"))?;

    if let Err(errors) = compiled.validate(value) {
        let details = errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{} failed schema validation:\n{}", kind.label(), details);
    }
    Ok(())
}
