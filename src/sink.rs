//! Presentation of results to a viewer.

use crate::mapping::{InferenceResult, Prediction};

/// Colour of faces that have no result.
pub const NO_RESULT_COLOR: [u8; 3] = [150, 150, 150];

/// Receiver of per-face colours and classification outcomes, typically a
/// 3D viewer.
pub trait VisualizationSink {
    /// One colour per face, indexed by face identifier.
    fn set_face_colors(&mut self, colors: &[[u8; 3]]);

    fn set_classification(&mut self, prediction: &Prediction, probabilities: &[f32]);
}

impl InferenceResult {
    /// Sends this result to `sink`.
    pub fn present(&self, sink: &mut dyn VisualizationSink) {
        match self {
            Self::Segmentation(seg) => sink.set_face_colors(&seg.face_colors()),
            Self::Classification(cls) => sink.set_classification(&cls.prediction, &cls.probabilities),
        }
    }
}
