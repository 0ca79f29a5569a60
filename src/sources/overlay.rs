//! Optional AI-generated level descriptions used to fill gaps in the SFIA export.
//!
//! The overlay never blocks a load: a missing, unreadable or malformed file
//! degrades to an empty overlay and the normalizer falls back to synthesized
//! text instead.

use crate::schema_loader::{DocumentKind, check_document};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AiOverlay {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    /// Skill code to level (as text) to description.
    #[serde(default)]
    pub descriptions: BTreeMap<String, BTreeMap<String, String>>,
}

impl AiOverlay {
    /// Non-blank overlay text for `code` at `level`.
    pub fn lookup(&self, code: &str, level: u8) -> Option<&str> {
        self.descriptions
            .get(code)?
            .get(&level.to_string())
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

pub fn parse_ai_overlay(data: &str) -> Result<AiOverlay> {
    let value: Value = serde_json::from_str(data).context("parsing AI descriptions")?;
    check_document(DocumentKind::AiOverlay, &value)?;
    serde_json::from_value(value).context("decoding AI descriptions")
}

/// Load the overlay at `path`, returning an empty overlay on any failure.
pub async fn load_ai_overlay(path: &Path) -> AiOverlay {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no AI descriptions overlay present");
            return AiOverlay::default();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unable to read AI descriptions overlay; ignoring it");
            return AiOverlay::default();
        }
    };

    match parse_ai_overlay(&data) {
        Ok(overlay) => {
            debug!(
                path = %path.display(),
                skills = overlay.descriptions.len(),
                "loaded AI descriptions overlay"
            );
            overlay
        }
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "ignoring unparsable AI descriptions overlay");
            AiOverlay::default()
        }
    }
}
