use crate::foundation::math::lerp;
use crate::scene::color::Color;
use crate::scene::model::{Entity, Snapshot, Timeline};

/// One entity's state at a given progress value.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedEntity {
    /// Entity id.
    pub id: String,
    /// Entity display label.
    pub label: String,
    /// Bar color.
    pub color: Color,
    /// Icon reference, if the entity has one.
    pub icon: Option<String>,
    /// Interpolated value.
    pub value: f64,
    /// Dense 0-based rank, descending by value.
    pub rank: usize,
}

/// The race state at a given progress value, entities ordered by rank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterpolatedFrame {
    /// Label shown as the date watermark (empty for an empty frame).
    pub display_label: String,
    /// Entities sorted by rank (`entities[i].rank == i`).
    pub entities: Vec<InterpolatedEntity>,
}

impl InterpolatedFrame {
    /// `true` when there is nothing to draw besides chrome.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity with rank 0, if any.
    pub fn leader(&self) -> Option<&InterpolatedEntity> {
        self.entities.first()
    }
}

/// Where a progress value falls on the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPosition {
    /// Index of the segment's first snapshot.
    pub start_index: usize,
    /// Index of the segment's last snapshot (`== start_index` only at the very end).
    pub end_index: usize,
    /// Position within the segment in `[0, 1]`.
    pub local_t: f64,
}

/// Locate `progress` on a timeline with `segments` segments.
///
/// Returns `None` when there is no segment to interpolate (fewer than two snapshots).
pub fn segment_position(segments: usize, progress: f64) -> Option<SegmentPosition> {
    if segments < 1 {
        return None;
    }
    let p = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let scaled = p * segments as f64;
    let start_index = (scaled.floor() as usize).min(segments);
    let end_index = (start_index + 1).min(segments);
    Some(SegmentPosition {
        start_index,
        end_index,
        local_t: scaled - start_index as f64,
    })
}

/// Interpolate entity values and ranks at `progress` in `[0, 1]`.
///
/// Out-of-range progress is clamped. Values missing from a snapshot read as `0`. Ranks are
/// assigned by a stable descending sort, so equal values keep the entities' original order. The
/// result depends only on the arguments.
///
/// With fewer than two snapshots the frame is empty.
pub fn interpolate(timeline: &Timeline, entities: &[Entity], progress: f64) -> InterpolatedFrame {
    let Some(pos) = segment_position(timeline.segments(), progress) else {
        return InterpolatedFrame::default();
    };
    let (Some(start), Some(end)) = (timeline.get(pos.start_index), timeline.get(pos.end_index))
    else {
        return InterpolatedFrame::default();
    };

    let mut out: Vec<InterpolatedEntity> = entities
        .iter()
        .map(|e| InterpolatedEntity {
            id: e.id.clone(),
            label: e.label.clone(),
            color: e.color,
            icon: e.icon.clone(),
            value: lerp(start.value_of(&e.id), end.value_of(&e.id), pos.local_t),
            rank: 0,
        })
        .collect();

    // `sort_by` is stable.
    out.sort_by(|a, b| b.value.total_cmp(&a.value));
    for (rank, e) in out.iter_mut().enumerate() {
        e.rank = rank;
    }

    InterpolatedFrame {
        display_label: display_label(start, end, pos.local_t),
        entities: out,
    }
}

/// Integer labels interpolate and floor (`"2012"`..`"2013"` at 0.5 gives `"2012"`); anything else
/// shows the segment's starting label verbatim.
fn display_label(start: &Snapshot, end: &Snapshot, local_t: f64) -> String {
    match (parse_int_label(&start.label), parse_int_label(&end.label)) {
        (Some(a), Some(b)) => {
            let v = lerp(a as f64, b as f64, local_t).floor();
            format!("{}", v as i64)
        }
        _ => start.label.clone(),
    }
}

fn parse_int_label(label: &str) -> Option<i64> {
    label.trim().parse::<i64>().ok()
}

#[cfg(test)]
#[path = "../../tests/unit/interp/frame.rs"]
mod tests;
