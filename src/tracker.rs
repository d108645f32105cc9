mod face_tracker;
mod matching;
mod rect;
mod track;
mod track_state;

pub use face_tracker::{Confirmation, FaceTracker, FrameUpdate, TrackerConfig};
pub use matching::{AssignmentResult, Detection, greedy_assignment};
pub use rect::{Rect, iou_batch};
pub use track::{Track, reset_track_id_counter};
pub use track_state::TrackStatus;
