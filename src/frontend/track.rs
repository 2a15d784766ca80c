//! Track lifecycle management: ages, continuity and retirement.
//!
//! The harness has no loop-closure detector, so any revisit of a landmark
//! that was not continuously tracked through the immediately preceding
//! keyframe must not be recognized: the track is retired and the landmark
//! continues under a brand-new identifier. Tracks are also retired once
//! their age exceeds the configured maximum, mirroring the bounded track
//! length of a real front end.

use std::collections::{HashMap, HashSet};

use super::types::{LandmarkId, TrackId};

/// Result of one lifecycle update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackUpdate {
    /// Identifier labeling this landmark's measurement at this keyframe.
    pub active_id: TrackId,
    /// Consecutive keyframes this identifier has been reported; 0 exactly
    /// when the identifier was (re)issued this keyframe.
    pub age: u32,
    /// True iff `age == 0`, i.e. the measurement starts a new track.
    pub is_new: bool,
}

/// Per-landmark track state, held in a slot arena.
#[derive(Debug, Clone)]
struct TrackSlot {
    active_id: TrackId,
    age: u32,
}

/// Owns track identity across keyframes.
///
/// `update` must be called once per observed landmark per keyframe, in any
/// order within a keyframe; keyframes themselves must be processed in
/// strict temporal order. Slots grow monotonically with the number of
/// distinct landmarks ever seen; retired identifiers come from a running
/// counter and are never reused.
#[derive(Debug)]
pub struct TrackLifecycle {
    max_feature_age: u32,
    slots: Vec<TrackSlot>,
    landmark_to_slot: HashMap<LandmarkId, usize>,
    next_fresh_id: u64,
}

impl TrackLifecycle {
    /// `first_fresh_id` seeds the retirement counter and must be larger
    /// than every dataset landmark id, so fresh identifiers never collide
    /// with ids minted from landmarks directly.
    pub fn new(max_feature_age: u32, first_fresh_id: u64) -> Self {
        Self {
            max_feature_age,
            slots: Vec::new(),
            landmark_to_slot: HashMap::new(),
            next_fresh_id: first_fresh_id,
        }
    }

    /// Advance the landmark's track by one keyframe.
    ///
    /// `previous_track_ids` is the set of track identifiers contained in
    /// the measurement batch of the immediately preceding keyframe; the
    /// continuity check looks exactly one keyframe back.
    pub fn update(
        &mut self,
        landmark_id: LandmarkId,
        previous_track_ids: &HashSet<TrackId>,
    ) -> TrackUpdate {
        let slot_idx = match self.landmark_to_slot.get(&landmark_id) {
            Some(&idx) => {
                // Seen in one more keyframe
                self.slots[idx].age += 1;
                idx
            }
            None => {
                // First-ever sighting: the landmark starts under its own id
                let idx = self.slots.len();
                self.slots.push(TrackSlot {
                    active_id: TrackId(landmark_id.0),
                    age: 0,
                });
                self.landmark_to_slot.insert(landmark_id, idx);
                idx
            }
        };

        let slot = &mut self.slots[slot_idx];

        // A re-sighting whose id was absent from the last keyframe's batch
        // is an undetected loop closure; force it past the age limit so it
        // retires below.
        if slot.age > 0 && !previous_track_ids.contains(&slot.active_id) {
            slot.age = self.max_feature_age + 1;
        }

        if slot.age > self.max_feature_age {
            slot.active_id = TrackId(self.next_fresh_id);
            self.next_fresh_id += 1;
            slot.age = 0;
        }

        TrackUpdate {
            active_id: slot.active_id,
            age: slot.age,
            is_new: slot.age == 0,
        }
    }

    /// Number of distinct landmarks ever seen.
    pub fn num_tracked_landmarks(&self) -> usize {
        self.slots.len()
    }
}
