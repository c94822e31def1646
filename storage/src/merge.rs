//! Merge rules for metadata patches.
//!
//! A record is never downgraded: a composite "requested → actual" model, and the settings that
//! came with it, can only be replaced by another composite value. Timestamps are kept once set,
//! except that a list-sourced timestamp gives way to a send-time capture carried by a model-less
//! patch or a composite upgrade. Filling in a missing model never moves a set timestamp.

use lens_core::{GenerationSettings, MetadataPatch, MetadataRecord, TimestampSource};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; the patch was written as a full record.
    Inserted,
    /// The existing record changed.
    Updated,
    /// The patch carried nothing new.
    Unchanged,
    /// The write was dropped (no character id or message id).
    Rejected,
    /// The backing store failed; nothing was written.
    Failed,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
            UpsertOutcome::Rejected => "rejected",
            UpsertOutcome::Failed => "failed",
        }
    }

    /// True when the backing store was written.
    pub fn is_write(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::Updated)
    }
}

/// Applies `incoming` on top of `existing`; returns the resulting record and the outcome.
pub fn merge(existing: Option<&MetadataRecord>, incoming: &MetadataPatch) -> (MetadataRecord, UpsertOutcome) {
    let Some(existing) = existing else {
        return (MetadataRecord::from(incoming.clone()), UpsertOutcome::Inserted);
    };

    let mut merged = existing.clone();

    if merged.role.is_none() {
        merged.role = incoming.role;
    }

    let change = merge_model(&mut merged, existing, incoming);
    merge_timestamp(&mut merged, incoming, change);
    merge_alternative(&mut merged, incoming);

    let outcome = if merged == *existing {
        UpsertOutcome::Unchanged
    } else {
        UpsertOutcome::Updated
    };
    (merged, outcome)
}

/// Which model rule a patch went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelChange {
    /// The patch carried no model.
    Absent,
    /// The existing record had no model; the patch supplied one.
    Filled,
    /// A composite model replaced the existing one.
    Upgraded,
    /// The existing model was kept.
    Kept,
}

fn merge_model(
    merged: &mut MetadataRecord,
    existing: &MetadataRecord,
    incoming: &MetadataPatch,
) -> ModelChange {
    let incoming_settings = incoming.settings.as_ref();
    let existing_composite = existing.has_composite_model();

    match (&existing.model, &incoming.model) {
        // Model unknown so far: take whatever the patch reports.
        (None, Some(model)) => {
            merged.model = Some(model.clone());
            if let Some(settings) = incoming_settings {
                overlay_settings(merged, settings);
            }
            ModelChange::Filled
        }
        // Composite values always win; this is how a plain model gets upgraded.
        (Some(_), Some(model)) if incoming.has_composite_model() => {
            merged.model = Some(model.clone());
            if let Some(settings) = incoming_settings {
                overlay_settings(merged, settings);
            }
            ModelChange::Upgraded
        }
        // Composite records are terminal for model and settings.
        _ if existing_composite => model_change_kept(incoming),
        _ => {
            if let Some(settings) = incoming_settings {
                let mut current = merged.settings();
                if current.fill_missing(settings) {
                    merged.set_settings(&current);
                }
            }
            model_change_kept(incoming)
        }
    }
}

fn model_change_kept(incoming: &MetadataPatch) -> ModelChange {
    if incoming.model.is_some() {
        ModelChange::Kept
    } else {
        ModelChange::Absent
    }
}

/// Incoming fields that are set replace existing ones; unset incoming fields keep what is there.
fn overlay_settings(merged: &mut MetadataRecord, incoming: &GenerationSettings) {
    let mut settings = incoming.clone();
    settings.fill_missing(&merged.settings());
    merged.set_settings(&settings);
}

/// A set timestamp only moves for a send-time capture over a list-sourced one, and only when the
/// patch carries no model or upgrades it to a composite one.
fn merge_timestamp(merged: &mut MetadataRecord, incoming: &MetadataPatch, change: ModelChange) {
    let Some(ts) = incoming.timestamp else {
        return;
    };
    let upgrade = matches!(change, ModelChange::Absent | ModelChange::Upgraded)
        && incoming.timestamp_source == TimestampSource::Sent
        && merged.timestamp_source != Some(TimestampSource::Sent);
    if merged.timestamp.is_none() || upgrade {
        merged.timestamp = Some(ts);
        merged.timestamp_source = Some(incoming.timestamp_source);
    }
}

/// The list endpoint's explicit `true` is authoritative; a send-time `false` only fills a gap.
fn merge_alternative(merged: &mut MetadataRecord, incoming: &MetadataPatch) {
    match incoming.is_alternative {
        Some(true) => merged.is_alternative = Some(true),
        Some(false) if merged.is_alternative.is_none() => merged.is_alternative = Some(false),
        _ => {}
    }
}
