use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{detection::Target, EvalError};

/// One image pair of an inference batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Reference image of the pair.
    #[serde(default)]
    pub image1: Option<String>,
    /// Query image of the pair, the one the targets are annotated on.
    pub image2: String,
}

/// The batch description used during inference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBatch {
    /// Image pairs in inference order.
    pub batch: Vec<BatchEntry>,
}

impl MetadataBatch {
    /// Build a batch from the query images, in inference order.
    pub fn from_images<S: Into<String>>(images: impl IntoIterator<Item = S>) -> Self {
        Self {
            batch: images
                .into_iter()
                .map(|image2| BatchEntry {
                    image1: None,
                    image2: image2.into(),
                })
                .collect(),
        }
    }

    // first occurrence wins for repeated images
    fn positions(&self) -> HashMap<&str, usize> {
        let mut positions = HashMap::with_capacity(self.batch.len());
        for (i, entry) in self.batch.iter().enumerate() {
            positions.entry(entry.image2.as_str()).or_insert(i);
        }
        positions
    }
}

/// Read a metadata batch file `{"batch": [{"image1": ..., "image2": ...}, ...]}`.
pub fn load_metadata_batch(path: impl AsRef<Path>) -> Result<MetadataBatch, EvalError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Select the targets used during inference, in inference order.
///
/// Targets whose `image` is not the `image2` of any batch entry are dropped. The
/// rest are stably sorted by the position of their image in the batch. No overlap
/// yields an empty list.
///
/// Example:
/// ```
/// use scenechange_eval::{align::{align_targets, MetadataBatch}, detection::Target};
///
/// let targets = ["a.png", "b.png", "c.png"].map(|image| Target {
///     image: image.to_string(),
///     ..Default::default()
/// });
/// let batch = MetadataBatch::from_images(["c.png", "a.png"]);
/// let aligned = align_targets(&targets, &batch);
/// let images = aligned.iter().map(|t| t.image.as_str()).collect::<Vec<_>>();
/// assert_eq!(images, vec!["c.png", "a.png"]);
/// ```
pub fn align_targets(all_targets: &[Target], metadata: &MetadataBatch) -> Vec<Target> {
    let positions = metadata.positions();

    let mut aligned = all_targets
        .iter()
        .filter_map(|t| positions.get(t.image.as_str()).map(|&p| (p, t)))
        .collect::<Vec<_>>();
    aligned.sort_by_key(|(p, _)| *p);

    if aligned.is_empty() && !all_targets.is_empty() {
        log::warn!("no target matches the {} batch images", metadata.batch.len());
    } else {
        log::debug!(
            "aligned {} of {} targets",
            aligned.len(),
            all_targets.len()
        );
    }

    aligned.into_iter().map(|(_, t)| t.clone()).collect()
}
