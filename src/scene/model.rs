use crate::foundation::error::{DataraceError, DataraceResult};
use crate::scene::color::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One competitor in the race. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique key referenced by snapshot values.
    pub id: String,
    /// Display label drawn on the bar.
    pub label: String,
    /// Bar color.
    pub color: Color,
    /// Optional icon reference (local path or `http(s)` URL).
    #[serde(default, alias = "image", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One timeline entry: a display label plus entity values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Display date/time string (e.g. `"2012"`).
    #[serde(alias = "date")]
    pub label: String,
    /// Entity id to value. Ids absent here read as `0`.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl Snapshot {
    /// Create a snapshot from `(id, value)` pairs.
    pub fn new<I, K>(label: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            label: label.into(),
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Value for `id`, defaulting to `0` when the id is absent.
    pub fn value_of(&self, id: &str) -> f64 {
        self.values.get(id).copied().unwrap_or(0.0)
    }
}

/// Ordered, non-empty sequence of snapshots.
///
/// Order is positional; labels are never used to re-sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Snapshot>", into = "Vec<Snapshot>")]
pub struct Timeline {
    snapshots: Vec<Snapshot>,
}

impl Timeline {
    /// Build a validated timeline.
    pub fn new(snapshots: Vec<Snapshot>) -> DataraceResult<Self> {
        if snapshots.is_empty() {
            return Err(DataraceError::validation(
                "timeline must contain at least one snapshot",
            ));
        }
        for (i, s) in snapshots.iter().enumerate() {
            if let Some((id, v)) = s.values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(DataraceError::validation(format!(
                    "timeline[{i}] value for '{id}' must be finite, got {v}"
                )));
            }
        }
        Ok(Self { snapshots })
    }

    /// Number of snapshots (always >= 1).
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always `false`; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Number of interpolation segments (`len - 1`).
    pub fn segments(&self) -> usize {
        self.snapshots.len().saturating_sub(1)
    }

    /// Snapshot at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Borrow all snapshots in order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

impl TryFrom<Vec<Snapshot>> for Timeline {
    type Error = DataraceError;

    fn try_from(value: Vec<Snapshot>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Timeline> for Vec<Snapshot> {
    fn from(value: Timeline) -> Self {
        value.snapshots
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
