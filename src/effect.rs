//! Migration effect recorder (C10).
//!
//! Append-only record of what happened to each planned change, the sole
//! observable output consumed by `after_migration`/`after_workflow` hooks
//! and by fixture-based tests (`4.10`). Serializable the same way the
//! teacher's per-commit result structures are, so a run's effect list can
//! be diffed against a golden JSON file.

use serde::Serialize;

use crate::{
   change::Author,
   destination::{DestinationRef, WriteStatus},
   revision::Revision,
};

/// One effect's classification, matching `spec.md` §3's `Migration
/// effect` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectType {
   Created,
   Updated,
   Noop,
   NoopAgainstPendingChange,
   InsufficientApprovals,
   Error,
   Started,
}

impl From<WriteStatus> for EffectType {
   fn from(status: WriteStatus) -> Self {
      match status {
         WriteStatus::Created => Self::Created,
         WriteStatus::Updated => Self::Updated,
         WriteStatus::NoOp => Self::Noop,
         WriteStatus::InsufficientApprovals => Self::InsufficientApprovals,
      }
   }
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectDestinationRef {
   pub id:   String,
   pub kind: String,
   pub url:  Option<String>,
}

impl From<&DestinationRef> for EffectDestinationRef {
   fn from(r: &DestinationRef) -> Self {
      Self { id: r.id.clone(), kind: r.kind.clone(), url: r.url.clone() }
   }
}

/// `(type, origin_refs, destination_ref?, summary, errors[])` from
/// `spec.md` §3.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationEffect {
   #[serde(rename = "type")]
   pub effect_type:     EffectType,
   pub origin_refs:     Vec<String>,
   pub destination_ref: Option<EffectDestinationRef>,
   pub summary:         String,
   #[serde(skip_serializing_if = "Vec::is_empty")]
   pub errors:          Vec<String>,
}

impl MigrationEffect {
   pub fn started(origin_refs: Vec<String>, summary: impl Into<String>) -> Self {
      Self { effect_type: EffectType::Started, origin_refs, destination_ref: None, summary: summary.into(), errors: Vec::new() }
   }

   pub fn error(origin_refs: Vec<String>, summary: impl Into<String>, errors: Vec<String>) -> Self {
      Self { effect_type: EffectType::Error, origin_refs, destination_ref: None, summary: summary.into(), errors }
   }

   pub fn from_write(
      origin_refs: Vec<String>,
      status: WriteStatus,
      destination_ref: Option<&DestinationRef>,
      summary: impl Into<String>,
   ) -> Self {
      Self {
         effect_type: status.into(),
         origin_refs,
         destination_ref: destination_ref.map(EffectDestinationRef::from),
         summary: summary.into(),
         errors: Vec::new(),
      }
   }
}

/// Run-scoped, append-only vector of recorded effects. Finish hooks may
/// push further entries but the recorder exposes no API to mutate or
/// remove an existing one — matching `4.10`'s "cannot mutate prior
/// entries" rule.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EffectRecorder {
   effects: Vec<MigrationEffect>,
}

impl EffectRecorder {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn record(&mut self, effect: MigrationEffect) {
      self.effects.push(effect);
   }

   pub fn effects(&self) -> &[MigrationEffect] {
      &self.effects
   }

   pub fn has_errors(&self) -> bool {
      self.effects.iter().any(|e| e.effect_type == EffectType::Error)
   }
}

/// One origin revision's id, for populating `origin_refs` without
/// pulling in the full [`Revision`] type at call sites.
pub fn origin_ref(revision: &Revision) -> String {
   revision.id().to_string()
}

/// Summarize an author for inclusion in a human-readable effect summary.
pub fn author_summary(author: &Author) -> String {
   author.to_string()
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn from_write_maps_status_to_effect_type() {
      let dest_ref = DestinationRef { id: "abc".to_string(), kind: "git-commit".to_string(), url: None };
      let effect = MigrationEffect::from_write(vec!["c1".to_string()], WriteStatus::Created, Some(&dest_ref), "imported c1");
      assert_eq!(effect.effect_type, EffectType::Created);
      assert_eq!(effect.destination_ref.unwrap().id, "abc");
   }

   #[test]
   fn recorder_is_append_only_and_tracks_errors() {
      let mut recorder = EffectRecorder::new();
      recorder.record(MigrationEffect::started(vec!["c1".to_string()], "starting"));
      assert!(!recorder.has_errors());
      recorder.record(MigrationEffect::error(vec!["c1".to_string()], "failed", vec!["boom".to_string()]));
      assert!(recorder.has_errors());
      assert_eq!(recorder.effects().len(), 2);
   }
}
