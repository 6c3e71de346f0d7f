//! Track store and greedy nearest-neighbor matcher.
//!
//! Each physical face keeps one [`TrackId`] for as long as it is detected
//! within the configured timeout. Matching is greedy in detector order: a
//! detection claims the closest unclaimed track whose smoothed position is
//! within `max(match_min_distance, bbox_width * match_width_fraction)` of its
//! nose, otherwise it opens a new track. This is not a global assignment.

use crate::{
    config::EngineConfig,
    detection::Detection,
    filters::{
        adaptive::{AdaptiveFilter, SmoothedPose},
        exponential::ExponentialFilter,
    },
    pose_estimation::{base_scale, estimate_pose, target_scale, RawPose},
    utils::distance,
};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Stable identity of a tracked face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tracked face
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Smoothed nose position and pose
    pub pose: SmoothedPose,
    /// Bounding box height when the track was created
    pub base_face_height: f64,
    /// Overlay scale that matched the face at creation
    pub base_scale: f64,
    /// Smoothed overlay scale
    pub scale_factor: f64,
    pub last_seen: Instant,
}

impl Track {
    fn new(id: TrackId, raw: &RawPose, detection: &Detection, overlay_height: u32, now: Instant) -> Self {
        let face_height = detection.bbox.height;
        let base = base_scale(face_height, overlay_height);
        Self {
            id,
            pose: SmoothedPose::from(raw),
            base_face_height: face_height,
            base_scale: base,
            scale_factor: base,
            last_seen: now,
        }
    }

    fn update(
        &mut self,
        raw: &RawPose,
        detection: &Detection,
        smoother: &AdaptiveFilter,
        scale_filter: &ExponentialFilter,
        overlay_height: u32,
        now: Instant,
    ) {
        self.pose = smoother.apply(&self.pose, raw, detection.bbox.width);
        let target = target_scale(detection.bbox.height, self.base_face_height, self.base_scale, overlay_height);
        self.scale_factor = scale_filter.apply(self.scale_factor, target);
        self.last_seen = now;
    }

    /// Ratio of the current scale to the creation baseline
    #[must_use]
    pub fn relative_scale(&self) -> f64 {
        if self.base_scale == 0.0 {
            1.0
        } else {
            self.scale_factor / self.base_scale
        }
    }
}

/// Read-only view of a track for enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub pose: SmoothedPose,
    pub base_face_height: f64,
    pub base_scale: f64,
    pub scale_factor: f64,
    pub last_seen: Instant,
}

impl From<&Track> for TrackSnapshot {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            pose: track.pose,
            base_face_height: track.base_face_height,
            base_scale: track.base_scale,
            scale_factor: track.scale_factor,
            last_seen: track.last_seen,
        }
    }
}

/// Arena of live tracks keyed by id
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: HashMap<TrackId, Track>,
    next_id: u64,
}

impl TrackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tracks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Drop every track; ids keep counting from where they were
    pub fn clear(&mut self) {
        if !self.tracks.is_empty() {
            log::debug!("Clearing {} tracks", self.tracks.len());
        }
        self.tracks.clear();
    }

    /// Match this frame's detections to tracks and update their state
    ///
    /// At most `config.max_faces` detections are considered, in input order.
    /// Returns the track id of each considered detection, in the same order.
    /// Tracks that are not matched are left untouched.
    pub fn update(
        &mut self,
        detections: &[Detection],
        config: &EngineConfig,
        overlay_height: u32,
        now: Instant,
    ) -> Vec<TrackId> {
        let smoother = AdaptiveFilter::new(config.smooth, config.min_smooth);
        let scale_filter = ExponentialFilter::new(config.scale_retain);
        // Tracks that existed before this frame; new ones cannot be claimed twice
        let mut candidates: Vec<TrackId> = self.tracks.keys().copied().collect();
        candidates.sort_unstable();

        let mut assigned = Vec::with_capacity(detections.len().min(config.max_faces));

        for detection in detections.iter().take(config.max_faces) {
            let raw = estimate_pose(detection);
            let threshold = config.match_threshold(detection.bbox.width);

            let nearest = self.nearest(&candidates, &raw);
            match nearest {
                Some((index, dist)) if dist <= threshold => {
                    let id = candidates.remove(index);
                    if let Some(track) = self.tracks.get_mut(&id) {
                        track.update(&raw, detection, &smoother, &scale_filter, overlay_height, now);
                    }
                    log::trace!("Detection matched track {id} at distance {dist:.1}");
                    assigned.push(id);
                }
                _ => {
                    let id = self.allocate_id();
                    self.tracks
                        .insert(id, Track::new(id, &raw, detection, overlay_height, now));
                    log::debug!("Created track {id}");
                    assigned.push(id);
                }
            }
        }

        assigned
    }

    /// Remove tracks unseen for longer than `timeout`, returning how many went
    pub fn evict_stale(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|id, track| {
            let keep = now.saturating_duration_since(track.last_seen) <= timeout;
            if !keep {
                log::debug!("Evicting stale track {id}");
            }
            keep
        });
        before - self.tracks.len()
    }

    /// Snapshot of every live track, sorted by id
    #[must_use]
    pub fn snapshots(&self) -> Vec<TrackSnapshot> {
        let mut snapshots: Vec<TrackSnapshot> = self.tracks.values().map(TrackSnapshot::from).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    // Ties go to the lower id since candidates are sorted.
    fn nearest(&self, candidates: &[TrackId], raw: &RawPose) -> Option<(usize, f64)> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                self.tracks.get(id).map(|track| {
                    let dist = distance((raw.nose.x, raw.nose.y), (track.pose.cx, track.pose.cy));
                    (index, dist)
                })
            })
            .fold(None, |best: Option<(usize, f64)>, (index, dist)| match best {
                Some((_, best_dist)) if best_dist <= dist => best,
                _ => Some((index, dist)),
            })
    }
}
