//! Mapping of raw model outputs back onto the faces of a solid.

mod mapper;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::inference::Mode;
use crate::sink::NO_RESULT_COLOR;

pub use mapper::{argmax, softmax, ResultMapper};

/// A label chosen for a face or a solid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label_id: usize,
    pub name: String,
    pub color: [u8; 3],
    /// Softmax probability of the chosen label, in `[0, 1]`.
    pub confidence: f32,
}

/// Result for one face.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FaceOutcome {
    Labeled(Prediction),
    /// The face has no graph node; `reason` is the sampling error text.
    NoResult { reason: String },
}

impl FaceOutcome {
    /// Prediction of a labelled face.
    #[must_use]
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Self::Labeled(p) => Some(p),
            Self::NoResult { .. } => None,
        }
    }

    /// Label id of a labelled face.
    #[must_use]
    pub fn label_id(&self) -> Option<usize> {
        self.prediction().map(|p| p.label_id)
    }
}

/// Per-face segmentation, indexed by face identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    faces: Vec<FaceOutcome>,
}

impl SegmentationResult {
    /// Wraps one outcome per face, in face order.
    #[must_use]
    pub fn new(faces: Vec<FaceOutcome>) -> Self {
        Self { faces }
    }

    /// Number of faces, with or without a result.
    #[must_use]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Outcome of `face`.
    #[must_use]
    pub fn face(&self, face: usize) -> Option<&FaceOutcome> {
        self.faces.get(face)
    }

    /// Outcomes in face order.
    #[must_use]
    pub fn faces(&self) -> &[FaceOutcome] {
        &self.faces
    }

    /// Label id of every face, `None` where there is no result.
    #[must_use]
    pub fn label_ids(&self) -> Vec<Option<usize>> {
        self.faces.iter().map(FaceOutcome::label_id).collect()
    }

    /// Number of faces per label id. Faces without result are not counted.
    #[must_use]
    pub fn histogram(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for id in self.faces.iter().filter_map(FaceOutcome::label_id) {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts
    }

    /// Faces labelled `label_id`, ascending.
    #[must_use]
    pub fn faces_with_label(&self, label_id: usize) -> Vec<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, o)| o.label_id() == Some(label_id))
            .map(|(face, _)| face)
            .collect()
    }

    /// Display colour of every face.
    #[must_use]
    pub fn face_colors(&self) -> Vec<[u8; 3]> {
        self.faces
            .iter()
            .map(|o| o.prediction().map_or(NO_RESULT_COLOR, |p| p.color))
            .collect()
    }

    /// Number of faces with a label.
    #[must_use]
    pub fn num_labeled(&self) -> usize {
        self.faces.iter().filter(|o| o.prediction().is_some()).count()
    }
}

/// Whole-solid classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub prediction: Prediction,
    /// Probability of every class, by label id.
    pub probabilities: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InferenceResult {
    Segmentation(SegmentationResult),
    Classification(ClassificationResult),
}

impl InferenceResult {
    /// Mode of the result.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Segmentation(_) => Mode::Segmentation,
            Self::Classification(_) => Mode::Classification,
        }
    }

    /// The per-face result, if this is a segmentation.
    #[must_use]
    pub fn as_segmentation(&self) -> Option<&SegmentationResult> {
        match self {
            Self::Segmentation(s) => Some(s),
            Self::Classification(_) => None,
        }
    }

    /// The per-solid result, if this is a classification.
    #[must_use]
    pub fn as_classification(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classification(c) => Some(c),
            Self::Segmentation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(id: usize) -> FaceOutcome {
        FaceOutcome::Labeled(Prediction {
            label_id: id,
            name: format!("l{id}"),
            color: [10, 20, 30],
            confidence: 0.9,
        })
    }

    #[test]
    fn helpers_skip_faces_without_result() {
        let result = SegmentationResult::new(vec![
            labeled(1),
            FaceOutcome::NoResult {
                reason: "unsupported".into(),
            },
            labeled(1),
            labeled(0),
        ]);
        assert_eq!(result.histogram(), BTreeMap::from([(0, 1), (1, 2)]));
        assert_eq!(result.faces_with_label(1), vec![0, 2]);
        assert_eq!(result.label_ids(), vec![Some(1), None, Some(1), Some(0)]);
        assert_eq!(result.face_colors()[1], NO_RESULT_COLOR);
        assert_eq!(result.num_labeled(), 3);
    }
}
