//! Detection-to-track association by greedy IoU matching.

use crate::tracker::rect::Rect;
use ndarray::Array2;

/// Detection input for the tracker.
///
/// One per visible face per frame, produced fresh by the external
/// detector and never retained across frames.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounding box of the detected face
    pub bbox: Rect,
    /// Detection confidence score in [0, 1]
    pub score: f32,
}

impl Detection {
    /// Build from TLBR coordinates (x1, y1, x2, y2) plus confidence.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self { bbox, score }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Greedy, order-dependent assignment of detections to tracks.
///
/// Rows (tracks) are visited in store order; each takes the
/// highest-IoU detection not yet claimed by an earlier track, provided
/// the IoU strictly exceeds `thresh`. An earlier track claims its best
/// detection before a later track can consider it, even if the later
/// track would have scored higher for that same detection. Ties keep
/// the lowest detection index.
pub fn greedy_assignment(ious: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_tracks, num_dets) = ious.dim();

    let mut matches = Vec::new();
    let mut unmatched_tracks = Vec::new();
    let mut claimed = vec![false; num_dets];

    for i in 0..num_tracks {
        let mut best_j = None;
        let mut best_iou = thresh;
        for j in 0..num_dets {
            if claimed[j] {
                continue;
            }
            if ious[[i, j]] > best_iou {
                best_iou = ious[[i, j]];
                best_j = Some(j);
            }
        }
        match best_j {
            Some(j) => {
                claimed[j] = true;
                matches.push((i, j));
            }
            None => unmatched_tracks.push(i),
        }
    }

    let unmatched_detections = claimed
        .iter()
        .enumerate()
        .filter_map(|(j, &c)| if c { None } else { Some(j) })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::rect::iou_batch;

    fn boxes(coords: &[(f32, f32, f32, f32)]) -> Vec<Rect> {
        coords
            .iter()
            .map(|&(x1, y1, x2, y2)| Rect::from_tlbr(x1, y1, x2, y2))
            .collect()
    }

    #[test]
    fn test_single_match() {
        let tracks = boxes(&[(0.0, 0.0, 100.0, 100.0)]);
        let dets = boxes(&[(5.0, 5.0, 105.0, 105.0)]);
        let result = greedy_assignment(&iou_batch(&tracks, &dets), 0.5);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert!(result.unmatched_tracks.is_empty());
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let tracks = boxes(&[(0.0, 0.0, 100.0, 100.0)]);
        let dets = boxes(&[(90.0, 90.0, 190.0, 190.0)]);
        let result = greedy_assignment(&iou_batch(&tracks, &dets), 0.8);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_earlier_track_claims_first() {
        // Both tracks overlap detection 0, the later track more strongly.
        // Greedy order still hands it to the earlier track.
        let tracks = boxes(&[(0.0, 0.0, 100.0, 100.0), (10.0, 10.0, 110.0, 110.0)]);
        let dets = boxes(&[(10.0, 10.0, 110.0, 110.0)]);
        let result = greedy_assignment(&iou_batch(&tracks, &dets), 0.5);
        assert_eq!(result.matches, vec![(0, 0)]);
        assert_eq!(result.unmatched_tracks, vec![1]);
    }

    #[test]
    fn test_empty_inputs() {
        let result = greedy_assignment(&Array2::zeros((0, 2)), 0.8);
        assert!(result.matches.is_empty());
        assert!(result.unmatched_tracks.is_empty());
        assert_eq!(result.unmatched_detections, vec![0, 1]);

        let result = greedy_assignment(&Array2::zeros((2, 0)), 0.8);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn test_exact_threshold_does_not_match() {
        let mut ious = Array2::zeros((1, 1));
        ious[[0, 0]] = 0.8;
        let result = greedy_assignment(&ious, 0.8);
        assert!(result.matches.is_empty());
    }
}
