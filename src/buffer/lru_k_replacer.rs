use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use crate::common::access_type::AccessType;
use crate::common::config::FrameId;

/// Per-frame access history tracked by the replacer.
#[derive(Debug)]
struct LRUKNode {
    /// Up to `k` most recent access timestamps, oldest first.
    history: VecDeque<u64>,
    is_evictable: bool,
}

impl LRUKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    /// Backward k-distance against `current_ts`, or `None` if fewer than `k`
    /// accesses have been recorded (i.e. +∞).
    fn k_distance(&self, k: usize, current_ts: u64) -> Option<u64> {
        if self.history.len() < k {
            return None;
        }
        let kth_last = self.history[self.history.len() - k];
        Some(current_ts - kth_last)
    }

    fn earliest_access(&self) -> u64 {
        *self
            .history
            .front()
            .expect("a tracked node always has at least one recorded access")
    }
}

/// LRUKReplacer implements the LRU-K replacement policy.
///
/// The LRU-K algorithm evicts a frame whose backward k-distance is maximum
/// of all evictable frames. Backward k-distance is computed as the
/// difference in time between the current timestamp and the timestamp of
/// the k-th most recent access.
///
/// A frame with fewer than k historical references is given +∞ as its
/// backward k-distance. When multiple frames have +∞ backward k-distance,
/// classical LRU (oldest first access) is used to choose among them.
#[derive(Debug)]
pub struct LRUKReplacer {
    node_store: HashMap<FrameId, LRUKNode>,
    current_timestamp: u64,
    current_size: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    /// Creates a new replacer tracking up to `num_frames` frames, keeping
    /// `k` historical accesses per frame.
    pub fn new(num_frames: usize, k: usize) -> Self {
        Self {
            node_store: HashMap::new(),
            current_timestamp: 0,
            current_size: 0,
            replacer_size: num_frames,
            k,
        }
    }

    /// Records that `frame_id` was accessed at the current timestamp.
    /// Creates the node (non-evictable by default) if this is its first
    /// access.
    pub fn record_access(&mut self, frame_id: FrameId, access_type: AccessType) {
        assert!(
            frame_id < self.replacer_size,
            "frame id {} exceeds replacer size {}",
            frame_id,
            self.replacer_size
        );
        let _ = access_type;

        let ts = self.current_timestamp;
        self.current_timestamp += 1;

        let node = self.node_store.entry(frame_id).or_insert_with(LRUKNode::new);
        node.history.push_back(ts);
        while node.history.len() > self.k {
            node.history.pop_front();
        }
        tracing::trace!(frame_id, history_len = node.history.len(), "record_access");
    }

    /// Toggles whether `frame_id` is a candidate for eviction. No-op if the
    /// frame is unknown to the replacer.
    pub fn set_evictable(&mut self, frame_id: FrameId, set_evictable: bool) {
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable && !set_evictable {
            self.current_size -= 1;
        } else if !node.is_evictable && set_evictable {
            self.current_size += 1;
        }
        node.is_evictable = set_evictable;
    }

    /// Removes `frame_id`'s access history entirely. No-op if unknown.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is known but not currently evictable — removing
    /// a pinned frame's history is a precondition violation, not a
    /// recoverable outcome.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.node_store.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "precondition violated: frame {} is not evictable",
            frame_id
        );
        self.node_store.remove(&frame_id);
        self.current_size -= 1;
    }

    /// Number of frames currently marked evictable.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Selects and removes the victim with the largest backward k-distance
    /// among evictable frames, breaking ties in favor of the frame with the
    /// smallest earliest-access timestamp, and finally by smallest
    /// frame-id.
    pub fn evict(&mut self) -> Option<FrameId> {
        let current_ts = self.current_timestamp;
        let victim = self
            .node_store
            .iter()
            .filter(|(_, node)| node.is_evictable)
            .max_by(|(&id_a, a), (&id_b, b)| {
                compare_candidates(
                    a.k_distance(self.k, current_ts),
                    a,
                    id_a,
                    b.k_distance(self.k, current_ts),
                    b,
                    id_b,
                )
            })
            .map(|(&id, _)| id);

        if let Some(frame_id) = victim {
            self.node_store.remove(&frame_id);
            self.current_size -= 1;
            tracing::debug!(frame_id, "evict");
        }
        victim
    }
}

/// Orders two eviction candidates so that the one that should be evicted
/// compares `Greater`. Infinite (under-observed) candidates always beat
/// finite ones; among infinite candidates, the one accessed longest ago
/// wins; remaining ties go to the smaller frame-id.
fn compare_candidates(
    dist_a: Option<u64>,
    node_a: &LRUKNode,
    id_a: FrameId,
    dist_b: Option<u64>,
    node_b: &LRUKNode,
    id_b: FrameId,
) -> Ordering {
    match (dist_a, dist_b) {
        (None, None) => node_b
            .earliest_access()
            .cmp(&node_a.earliest_access())
            .then_with(|| id_b.cmp(&id_a)),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b).then_with(|| id_b.cmp(&id_a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_k_cmu_sample() {
        crate::init_test_tracing();
        let mut lru_replacer = LRUKReplacer::new(7, 2);

        // Scenario: add six elements to the replacer. We have [1,2,3,4,5]. Frame 6 is
        // non-evictable.
        lru_replacer.record_access(1, AccessType::Unknown);
        lru_replacer.record_access(2, AccessType::Unknown);
        lru_replacer.record_access(3, AccessType::Unknown);
        lru_replacer.record_access(4, AccessType::Unknown);
        lru_replacer.record_access(5, AccessType::Unknown);
        lru_replacer.record_access(6, AccessType::Unknown);
        lru_replacer.set_evictable(1, true);
        lru_replacer.set_evictable(2, true);
        lru_replacer.set_evictable(3, true);
        lru_replacer.set_evictable(4, true);
        lru_replacer.set_evictable(5, true);
        lru_replacer.set_evictable(6, false);
        assert_eq!(5, lru_replacer.size());

        // Scenario: Insert access history for frame 1. Now frame 1 has two access
        // histories. All other frames have max backward k-dist. The order of
        // eviction is [2,3,4,5,1].
        lru_replacer.record_access(1, AccessType::Unknown);

        // Scenario: Evict three pages from the replacer. Elements with max k-distance
        // should be popped first based on LRU.
        assert_eq!(Some(2), lru_replacer.evict());
        assert_eq!(Some(3), lru_replacer.evict());
        assert_eq!(Some(4), lru_replacer.evict());
        assert_eq!(lru_replacer.size(), 2);

        // Scenario: Now replacer has frames [5,1]. Insert new frames 3, 4, and update
        // access history for 5. We should end with [3,1,5,4]
        lru_replacer.record_access(3, AccessType::Unknown);
        lru_replacer.record_access(4, AccessType::Unknown);
        lru_replacer.record_access(5, AccessType::Unknown);
        lru_replacer.record_access(4, AccessType::Unknown);
        lru_replacer.set_evictable(3, true);
        lru_replacer.set_evictable(4, true);
        assert_eq!(4, lru_replacer.size());

        // Scenario: continue looking for victims. We expect 3 to be evicted next.
        assert_eq!(Some(3), lru_replacer.evict());
        assert_eq!(3, lru_replacer.size());

        // Set 6 to be evictable. 6 should be evicted next since it has max backward
        // k-dist.
        lru_replacer.set_evictable(6, true);
        assert_eq!(4, lru_replacer.size());
        assert_eq!(Some(6), lru_replacer.evict());
        assert_eq!(3, lru_replacer.size());

        // Now we have [1,5,4]. Continue looking for victims.
        lru_replacer.set_evictable(1, false);
        assert_eq!(2, lru_replacer.size());
        assert_eq!(Some(5), lru_replacer.evict());
        assert_eq!(1, lru_replacer.size());

        // Update access history for 1. Now we have [4,1]. Next victim is 4.
        lru_replacer.record_access(1, AccessType::Unknown);
        lru_replacer.record_access(1, AccessType::Unknown);
        lru_replacer.set_evictable(1, true);
        assert_eq!(2, lru_replacer.size());
        assert_eq!(Some(4), lru_replacer.evict());

        assert_eq!(1, lru_replacer.size());
        assert_eq!(Some(1), lru_replacer.evict());
        assert_eq!(0, lru_replacer.size());

        // This operation should not modify size.
        assert_eq!(None, lru_replacer.evict());
        assert_eq!(0, lru_replacer.size());
    }

    #[test]
    fn under_observed_frames_tie_break_on_earliest_access_not_just_count() {
        let mut replacer = LRUKReplacer::new(3, 2);
        replacer.record_access(0, AccessType::Unknown);
        replacer.record_access(1, AccessType::Unknown);
        replacer.record_access(2, AccessType::Unknown);
        replacer.set_evictable(0, true);
        replacer.set_evictable(1, true);
        replacer.set_evictable(2, true);

        // All three are under-observed (only one access each, k=2). Frame 0
        // was accessed first, so it must be evicted first, exercising the
        // "more than one under-observed candidate" path the reference
        // implementation's off-by-one bug skipped.
        assert_eq!(Some(0), replacer.evict());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(Some(2), replacer.evict());
    }

    #[test]
    #[should_panic(expected = "not evictable")]
    fn remove_on_pinned_frame_panics() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(0, AccessType::Unknown);
        replacer.remove(0);
    }

    #[test]
    fn remove_unknown_frame_is_a_no_op() {
        let mut replacer = LRUKReplacer::new(2, 2);
        replacer.remove(5);
        assert_eq!(0, replacer.size());
    }
}
