use crate::foundation::error::{DataraceError, DataraceResult};
use crate::scene::model::{Entity, Timeline};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A complete race dataset: chart chrome text, entities and the timeline.
///
/// This is the JSON-facing document produced by the dataset editor or a generator. Constructors
/// validate it; a `Dataset` value is always well formed and is never mutated by the core (edits
/// replace it wholesale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Chart title.
    #[serde(default)]
    pub title: String,
    /// Chart subtitle.
    #[serde(default)]
    pub subtitle: String,
    /// Data source attribution.
    #[serde(default)]
    pub source: String,
    /// Competitors, in their original (tie-breaking) order.
    pub entities: Vec<Entity>,
    /// Ordered snapshots.
    pub timeline: Timeline,
}

impl Dataset {
    /// Build and validate a dataset from parts.
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        source: impl Into<String>,
        entities: Vec<Entity>,
        timeline: Timeline,
    ) -> DataraceResult<Self> {
        let mut ds = Self {
            title: title.into(),
            subtitle: subtitle.into(),
            source: source.into(),
            entities,
            timeline,
        };
        ds.validate()?;
        Ok(ds)
    }

    /// Parse a dataset from a JSON string.
    pub fn from_json_str(s: &str) -> DataraceResult<Self> {
        let value: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| DataraceError::validation(format!("invalid dataset JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a dataset from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> DataraceResult<Self> {
        let value: serde_json::Value = serde_json::from_reader(r)
            .map_err(|e| DataraceError::validation(format!("invalid dataset JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a dataset from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> DataraceResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            DataraceError::validation(format!("open dataset JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Validate an already-parsed JSON document.
    ///
    /// `entities` and `timeline` must be present as arrays before any field-level decoding
    /// happens, so a document with the wrong overall shape gets a precise message.
    pub fn from_value(value: serde_json::Value) -> DataraceResult<Self> {
        let Some(obj) = value.as_object() else {
            return Err(DataraceError::validation(
                "dataset document must be a JSON object",
            ));
        };
        if !obj.get("timeline").is_some_and(|v| v.is_array()) {
            return Err(DataraceError::validation("missing 'timeline' array"));
        }
        if !obj.get("entities").is_some_and(|v| v.is_array()) {
            return Err(DataraceError::validation("missing 'entities' array"));
        }

        let mut ds: Dataset = serde_json::from_value(value)
            .map_err(|e| DataraceError::validation(format!("invalid dataset: {e}")))?;
        ds.validate()?;
        Ok(ds)
    }

    /// Serialize to pretty JSON (the editor's presentation form).
    pub fn to_json_pretty(&self) -> DataraceResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DataraceError::Other(anyhow::Error::new(e).context("serialize dataset")))
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn validate(&mut self) -> DataraceResult<()> {
        let mut seen = HashSet::with_capacity(self.entities.len());
        for (i, e) in self.entities.iter_mut().enumerate() {
            if e.id.trim().is_empty() {
                return Err(DataraceError::validation(format!(
                    "entities[{i}].id must be non-empty"
                )));
            }
            if !seen.insert(e.id.clone()) {
                return Err(DataraceError::validation(format!(
                    "duplicate entity id '{}'",
                    e.id
                )));
            }
            // Generators commonly emit "" for an unknown icon.
            if e.icon.as_deref().is_some_and(|s| s.trim().is_empty()) {
                e.icon = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/dataset.rs"]
mod tests;
