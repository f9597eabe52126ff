use serde::{Deserialize, Serialize};

use scenechange_bbox::{iou::box_area, BBox};

use crate::EvalError;

/// Predicted boxes of one image, in `xyxy` pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Boxes as `[x_min, y_min, x_max, y_max]`.
    pub boxes: Vec<[f64; 4]>,
    /// Confidence of each box.
    pub scores: Vec<f64>,
    /// Class id of each box.
    pub labels: Vec<i64>,
}

/// Ground-truth boxes of one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Image the boxes belong to, used to align targets with an inference batch.
    #[serde(default)]
    pub image: String,
    /// Boxes as `[x_min, y_min, x_max, y_max]`.
    pub boxes: Vec<[f64; 4]>,
    /// Class id of each box.
    pub labels: Vec<i64>,
}

impl Detection {
    fn length_mismatch(&self) -> Option<String> {
        if self.boxes.len() == self.scores.len() && self.boxes.len() == self.labels.len() {
            return None;
        }
        Some(format!(
            "{} boxes, {} scores and {} labels",
            self.boxes.len(),
            self.scores.len(),
            self.labels.len()
        ))
    }

    /// Check that boxes, scores and labels have the same length.
    ///
    /// `index` is the position of the record in its batch, reported in the error.
    pub fn validate(&self, index: usize) -> Result<(), EvalError> {
        match self.length_mismatch() {
            Some(reason) => Err(EvalError::InvalidRecord { index, reason }),
            None => Ok(()),
        }
    }

    /// Number of boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Check if there are no boxes.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn entries(&self) -> Result<impl Iterator<Item = (&[f64; 4], f64, i64)>, EvalError> {
        if let Some(reason) = self.length_mismatch() {
            return Err(EvalError::MalformedRecord(reason));
        }
        Ok(self
            .boxes
            .iter()
            .zip(&self.scores)
            .zip(&self.labels)
            .map(|((b, &s), &l)| (b, s, l)))
    }

    fn from_entries<'a>(entries: impl Iterator<Item = (&'a [f64; 4], f64, i64)>) -> Self {
        let mut out = Self::default();
        for (b, s, l) in entries {
            out.boxes.push(*b);
            out.scores.push(s);
            out.labels.push(l);
        }
        out
    }

    /// Keep the boxes whose area is at least `min_area`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::MalformedRecord`] if the field lengths disagree.
    pub fn filter_by_area(&self, min_area: f64) -> Result<Self, EvalError> {
        Ok(Self::from_entries(
            self.entries()?.filter(|(b, _, _)| box_area(b) >= min_area),
        ))
    }

    /// Keep the boxes whose score is at least `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::MalformedRecord`] if the field lengths disagree.
    pub fn filter_low_confidence(&self, threshold: f64) -> Result<Self, EvalError> {
        Ok(Self::from_entries(
            self.entries()?.filter(|(_, s, _)| *s >= threshold),
        ))
    }

    /// Keep the `max` highest-scoring boxes, ordered by descending score.
    ///
    /// Boxes with equal scores keep their relative order.
    pub fn truncate(&self, max: usize) -> Result<Self, EvalError> {
        let mut entries = self.entries()?.collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        entries.truncate(max);
        Ok(Self::from_entries(entries.into_iter()))
    }
}

impl Target {
    /// Build a target from extracted boxes sharing a single class id.
    pub fn from_bboxes(image: impl Into<String>, boxes: &[BBox], label: i64) -> Self {
        Self {
            image: image.into(),
            boxes: boxes.iter().map(BBox::to_xyxy).collect(),
            labels: vec![label; boxes.len()],
        }
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), EvalError> {
        if self.boxes.len() != self.labels.len() {
            return Err(EvalError::InvalidRecord {
                index,
                reason: format!("{} boxes and {} labels", self.boxes.len(), self.labels.len()),
            });
        }
        Ok(())
    }

    /// Number of boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Check if there are no boxes.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
