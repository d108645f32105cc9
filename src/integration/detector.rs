//! Trait for face detection inference backends.

use crate::tracker::Detection;

/// Trait for face detection inference backends.
///
/// Implement this trait to connect any face detector to the tracker.
/// The detector is treated as opaque: it receives a raw frame and
/// returns zero or more bounding boxes with confidence scores.
///
/// # Example
///
/// ```ignore
/// use facetrack_rs::{DetectionSource, Detection};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error: std::fmt::Display;

    /// Run inference on raw image data and return detected faces.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    ///
    /// # Returns
    /// A vector of `Detection` objects, or an error. An empty vector
    /// is a normal result for a frame with no visible face.
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}
