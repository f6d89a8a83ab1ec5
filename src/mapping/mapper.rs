use ndarray::ArrayView1;
use tracing::debug;

use crate::error::{BrepGraphError, InferenceError, ModelMismatchError, UnknownLabelError};
use crate::graph::FaceGraph;
use crate::inference::{Mode, RawOutput};
use crate::labels::LabelTable;

use super::{ClassificationResult, FaceOutcome, InferenceResult, Prediction, SegmentationResult};

/// Numerically stable softmax of `logits`.
#[must_use]
pub fn softmax(logits: ArrayView1<'_, f32>) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value; the lowest index wins ties.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Turns raw model outputs into labelled results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultMapper;

impl ResultMapper {
    /// Maps `raw`, produced for `graph`, through `labels`.
    ///
    /// Segmentation rows are attached to faces through the graph's node
    /// order; every excluded face gets [`FaceOutcome::NoResult`].
    ///
    /// # Errors
    ///
    /// - [`ModelMismatchError::Mode`] when `raw` is not of `mode`.
    /// - [`InferenceError::OutputShape`] when the row count differs from the
    ///   node count.
    /// - [`UnknownLabelError`] when a chosen id is not in `labels`.
    pub fn map(
        raw: &RawOutput,
        graph: &FaceGraph,
        labels: &LabelTable,
        mode: Mode,
    ) -> Result<InferenceResult, BrepGraphError> {
        if raw.mode() != mode {
            return Err(ModelMismatchError::Mode {
                expected: mode,
                found: raw.mode(),
            }
            .into());
        }
        match raw {
            RawOutput::Segmentation(rows) => {
                if rows.nrows() != graph.num_nodes() {
                    return Err(InferenceError::OutputShape {
                        expected: vec![graph.num_nodes(), rows.ncols()],
                        found: rows.shape().to_vec(),
                    }
                    .into());
                }
                let mut faces: Vec<Option<FaceOutcome>> = vec![None; graph.num_faces()];
                for (node, row) in rows.outer_iter().enumerate() {
                    let (prediction, _) = predict(row, labels)?;
                    if let Some(slot) = graph.face_of(node).and_then(|f| faces.get_mut(f)) {
                        *slot = Some(FaceOutcome::Labeled(prediction));
                    }
                }
                for excluded in graph.excluded() {
                    if let Some(slot) = faces.get_mut(excluded.face()) {
                        *slot = Some(FaceOutcome::NoResult {
                            reason: excluded.to_string(),
                        });
                    }
                }
                let faces: Vec<FaceOutcome> = faces
                    .into_iter()
                    .map(|o| {
                        o.unwrap_or_else(|| FaceOutcome::NoResult {
                            reason: "face has no graph node".into(),
                        })
                    })
                    .collect();
                let result = SegmentationResult::new(faces);
                debug!(
                    faces = result.num_faces(),
                    labeled = result.num_labeled(),
                    "mapped segmentation"
                );
                Ok(InferenceResult::Segmentation(result))
            }
            RawOutput::Classification(logits) => {
                let (prediction, probabilities) = predict(logits.view(), labels)?;
                debug!(label = prediction.label_id, confidence = prediction.confidence, "mapped classification");
                Ok(InferenceResult::Classification(ClassificationResult {
                    prediction,
                    probabilities,
                }))
            }
        }
    }
}

fn predict(logits: ArrayView1<'_, f32>, labels: &LabelTable) -> Result<(Prediction, Vec<f32>), BrepGraphError> {
    let probabilities = softmax(logits);
    // Chosen on the logits: distinct logits can round to equal probabilities.
    let Some(label_id) = argmax(&logits.to_vec()) else {
        return Err(InferenceError::OutputShape {
            expected: vec![1],
            found: vec![0],
        }
        .into());
    };
    let label = labels.get(label_id).ok_or(UnknownLabelError {
        label_id,
        known: labels.len(),
    })?;
    let prediction = Prediction {
        label_id,
        name: label.name.clone(),
        color: label.color,
        confidence: probabilities[label_id].clamp(0.0, 1.0),
    };
    Ok((prediction, probabilities))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    use super::*;
    use crate::features::FeatureSampler;
    use crate::graph::GraphBuilder;
    use crate::step::parse_step;
    use crate::step::tests::{CUBE, CUBE_WITH_UNSUPPORTED};

    fn graph(text: &str) -> FaceGraph {
        let solid = parse_step(text).unwrap();
        let features = FeatureSampler::default().sample(&solid);
        GraphBuilder::default().build(&solid, &features).unwrap()
    }

    #[test]
    fn softmax_is_stable_and_normalized() {
        let p = softmax(array![1000.0_f32, 1000.0, 999.0].view());
        assert_relative_eq!(p.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(p[0], p[1]);
        assert!(p[2] < p[0]);
    }

    #[test]
    fn argmax_prefers_lowest_id_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn segmentation_maps_nodes_to_faces() {
        let g = graph(CUBE_WITH_UNSUPPORTED);
        assert_eq!(g.num_nodes(), 5);
        let mut rows = Array2::<f32>::zeros((5, 2));
        for node in 0..5 {
            rows[[node, node % 2]] = 3.0;
        }
        let labels = LabelTable::from_names(["even", "odd"]);
        let result = ResultMapper::map(&RawOutput::Segmentation(rows), &g, &labels, Mode::Segmentation).unwrap();
        let seg = result.as_segmentation().unwrap();
        assert_eq!(seg.num_faces(), 6);
        assert!(matches!(seg.face(3), Some(FaceOutcome::NoResult { .. })));
        for node in 0..5 {
            let face = g.face_of(node).unwrap();
            let p = seg.face(face).unwrap().prediction().unwrap();
            assert_eq!(p.label_id, node % 2);
            assert!(p.confidence > 0.9 && p.confidence <= 1.0);
        }
    }

    #[test]
    fn unknown_label_is_an_error() {
        let g = graph(CUBE);
        let mut rows = Array2::<f32>::zeros((6, 3));
        rows[[4, 2]] = 5.0;
        let labels = LabelTable::from_names(["a", "b"]);
        let err = ResultMapper::map(&RawOutput::Segmentation(rows), &g, &labels, Mode::Segmentation).unwrap_err();
        assert!(matches!(
            err,
            BrepGraphError::UnknownLabel(UnknownLabelError { label_id: 2, known: 2 })
        ));
    }

    #[test]
    fn classification_carries_probabilities() {
        let g = graph(CUBE);
        let labels = LabelTable::from_names(["bracket", "shaft", "plate"]);
        let raw = RawOutput::Classification(array![0.0, 2.0, 1.0]);
        let result = ResultMapper::map(&raw, &g, &labels, Mode::Classification).unwrap();
        let cls = result.as_classification().unwrap();
        assert_eq!(cls.prediction.name, "shaft");
        assert_eq!(cls.probabilities.len(), 3);
        assert_relative_eq!(cls.prediction.confidence, cls.probabilities[1]);
    }

    #[test]
    fn nearly_equal_logits_keep_their_order() {
        let g = graph(CUBE);
        let labels = LabelTable::from_names(["bracket", "shaft"]);
        let raw = RawOutput::Classification(array![1e-9_f32, 2e-9]);
        let result = ResultMapper::map(&raw, &g, &labels, Mode::Classification).unwrap();
        let cls = result.as_classification().unwrap();
        assert_relative_eq!(cls.probabilities[0], cls.probabilities[1]);
        assert_eq!(cls.prediction.label_id, 1);
    }

    #[test]
    fn row_count_must_match_nodes() {
        let g = graph(CUBE);
        let labels = LabelTable::numbered(2);
        let raw = RawOutput::Segmentation(Array2::zeros((4, 2)));
        let err = ResultMapper::map(&raw, &g, &labels, Mode::Segmentation).unwrap_err();
        assert!(matches!(err, BrepGraphError::Inference(InferenceError::OutputShape { .. })));
    }
}
