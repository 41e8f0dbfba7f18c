//! Ordered subtitle entries of one project and the edits allowed on them.
//!
//! Entries are kept sorted by `(start_time, id)`. Ids grow monotonically, so
//! entries sharing a start time stay in creation order.

mod entry;

pub use entry::{EntryId, EntryPatch, NewEntry, SubtitleEntry};

use crate::error::{Error, Result};
pub(crate) use entry::validate_language;
use entry::{validate_range, validate_text, validate_time};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Whether edits may leave two entries covering the same instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    #[default]
    Tolerate,
    Reject,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<SubtitleEntry>,
    next_id: u64,
    #[serde(skip)]
    policy: OverlapPolicy,
}

/// Result of a merge: the surviving entry and the id that was folded into it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: SubtitleEntry,
    pub removed: EntryId,
}

/// Read-only, time-ordered copy of a timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Vec<SubtitleEntry>);

impl Deref for Snapshot {
    type Target = [SubtitleEntry];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn set_policy(&mut self, policy: OverlapPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn subtitle_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&SubtitleEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Replace the whole timeline with machine-generated entries.
    ///
    /// Time ranges are validated for every entry before anything changes.
    /// Text is taken as is; recognizers can emit empty segments.
    pub fn load(&mut self, entries: Vec<NewEntry>) -> Result<usize> {
        for (index, entry) in entries.iter().enumerate() {
            validate_range(entry.start_time, entry.end_time).map_err(|e| match e {
                Error::Validation { field, message } => Error::Validation {
                    field,
                    message: format!("entry {}: {}", index, message),
                },
                other => other,
            })?;
        }

        let mut loaded = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.allocate_id();
            loaded.push(SubtitleEntry {
                id,
                start_time: entry.start_time,
                end_time: entry.end_time,
                text: entry.text,
                language: entry.language,
                confidence: entry.confidence,
                is_edited: false,
            });
        }
        self.entries = loaded;
        self.sort();
        Ok(self.entries.len())
    }

    /// Cut an entry in two at `split_at`. Both halves keep the full text.
    pub fn split(&mut self, id: EntryId, split_at: f64) -> Result<(SubtitleEntry, SubtitleEntry)> {
        let index = self.position(id)?;
        let original = &self.entries[index];
        if !(split_at.is_finite()
            && original.start_time < split_at
            && split_at < original.end_time)
        {
            return Err(Error::InvalidRange {
                start: original.start_time,
                end: original.end_time,
                split_at,
            });
        }

        let mut second = original.clone();
        second.id = self.allocate_id();
        second.start_time = split_at;
        second.is_edited = true;

        let first = &mut self.entries[index];
        first.end_time = split_at;
        first.is_edited = true;
        let first = first.clone();

        self.entries.push(second.clone());
        self.sort();
        Ok((first, second))
    }

    /// Fold the next entry by start time into this one.
    ///
    /// The successor is the entry with the smallest start strictly after this
    /// entry's start. Gaps or overlaps between the two are not checked.
    pub fn merge(&mut self, id: EntryId) -> Result<MergeOutcome> {
        let index = self.position(id)?;
        let start = self.entries[index].start_time;
        let next_index = self.entries[index + 1..]
            .iter()
            .position(|e| e.start_time > start)
            .map(|offset| index + 1 + offset)
            .ok_or(Error::NoSuccessor)?;

        let next_id = self.entries[next_index].id;
        let merged_end = self.entries[next_index].end_time;
        self.check_overlap(start, merged_end, &[id, next_id])?;

        let next = self.entries.remove(next_index);
        let entry = &mut self.entries[index];
        entry.end_time = next.end_time;
        entry.text = format!("{} {}", entry.text, next.text);
        entry.is_edited = true;

        Ok(MergeOutcome {
            merged: entry.clone(),
            removed: next.id,
        })
    }

    /// Apply a manual edit. Touched fields are re-validated.
    pub fn update(&mut self, id: EntryId, patch: EntryPatch) -> Result<SubtitleEntry> {
        let index = self.position(id)?;
        if patch.is_empty() {
            return Ok(self.entries[index].clone());
        }

        let current = &self.entries[index];
        if let Some(start) = patch.start_time {
            validate_time("start_time", start)?;
        }
        if let Some(end) = patch.end_time {
            validate_time("end_time", end)?;
        }
        let start = patch.start_time.unwrap_or(current.start_time);
        let end = patch.end_time.unwrap_or(current.end_time);
        validate_range(start, end)?;
        let text = patch.text.as_deref().map(validate_text).transpose()?;
        let language = patch.language.as_deref().map(validate_language).transpose()?;
        self.check_overlap(start, end, &[id])?;

        let entry = &mut self.entries[index];
        entry.start_time = start;
        entry.end_time = end;
        if let Some(text) = text {
            entry.text = text;
        }
        if let Some(language) = language {
            entry.language = language;
        }
        entry.is_edited = true;
        let updated = entry.clone();

        self.sort();
        Ok(updated)
    }

    /// Add a hand-written entry.
    pub fn insert(&mut self, entry: NewEntry) -> Result<SubtitleEntry> {
        validate_range(entry.start_time, entry.end_time)?;
        let text = validate_text(&entry.text)?;
        let language = validate_language(&entry.language)?;
        self.check_overlap(entry.start_time, entry.end_time, &[])?;

        let created = SubtitleEntry {
            id: self.allocate_id(),
            start_time: entry.start_time,
            end_time: entry.end_time,
            text,
            language,
            confidence: None,
            is_edited: true,
        };
        self.entries.push(created.clone());
        self.sort();
        Ok(created)
    }

    pub fn delete(&mut self, id: EntryId) -> Result<SubtitleEntry> {
        let index = self.position(id)?;
        Ok(self.entries.remove(index))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.entries.clone())
    }

    /// Neighbouring pairs whose ranges overlap, in timeline order.
    pub fn overlaps(&self) -> Vec<(EntryId, EntryId)> {
        let mut pairs = Vec::new();
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if b.start_time >= a.end_time {
                    break;
                }
                if a.overlaps(b.start_time, b.end_time) {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }

    /// Restore ordering and the id counter after deserialization.
    pub(crate) fn normalize(&mut self) {
        let max_id = self.entries.iter().map(|e| e.id.0 + 1).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id);
        self.sort();
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    fn position(&self, id: EntryId) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(Error::EntryNotFound(id))
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    fn check_overlap(&self, start: f64, end: f64, ignore: &[EntryId]) -> Result<()> {
        if self.policy == OverlapPolicy::Tolerate {
            return Ok(());
        }
        match self
            .entries
            .iter()
            .filter(|e| !ignore.contains(&e.id))
            .find(|e| e.overlaps(start, end))
        {
            Some(other) => Err(Error::validation(
                "start_time",
                format!("Subtitle would overlap entry {}", other.id),
            )),
            None => Ok(()),
        }
    }
}
