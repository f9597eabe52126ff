use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use scenechange_bbox::iou::{box_area, box_iou_matrix};

use crate::{
    detection::{Detection, Target},
    EvalError,
};

/// Upper bound of the unbounded area ranges.
const AREA_MAX: f64 = 1e10;

/// Names of the area ranges, in the order of the `area` axis of the result arrays.
pub const AREA_NAMES: [&str; 4] = ["all", "small", "medium", "large"];

/// Value reported for metrics without any ground truth to evaluate.
pub const MISSING: f64 = -1.0;

/// Pixel-area cutoffs of the small/medium/large buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaRanges {
    /// Upper bound of the small bucket.
    pub small: f64,
    /// Upper bound of the medium bucket.
    pub medium: f64,
}

impl Default for AreaRanges {
    fn default() -> Self {
        Self {
            small: 32.0 * 32.0,
            medium: 96.0 * 96.0,
        }
    }
}

impl AreaRanges {
    /// Inclusive `[min, max]` area of the all/small/medium/large buckets.
    pub fn ranges(&self) -> [[f64; 2]; 4] {
        [
            [0.0, AREA_MAX],
            [0.0, self.small],
            [self.small, self.medium],
            [self.medium, AREA_MAX],
        ]
    }
}

fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    let step = (end - start) / (num - 1) as f64;
    let mut values = (0..num).map(|i| start + i as f64 * step).collect::<Vec<_>>();
    if let Some(last) = values.last_mut() {
        *last = end;
    }
    values
}

/// Thresholds of the mean average precision evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// IoU thresholds a match must reach, default `0.50:0.05:0.95`.
    pub iou_thresholds: Vec<f64>,
    /// Recall values the precision is sampled at, default `0:0.01:1`.
    pub rec_thresholds: Vec<f64>,
    /// Maximum number of detections per image and class, default `[1, 3, 5]`.
    pub max_detection_thresholds: Vec<usize>,
    /// Small/medium/large area cutoffs.
    pub area_ranges: AreaRanges,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            iou_thresholds: linspace(0.5, 0.95, 10),
            rec_thresholds: linspace(0.0, 1.0, 101),
            max_detection_thresholds: vec![1, 3, 5],
            area_ranges: AreaRanges::default(),
        }
    }
}

impl MapConfig {
    /// Check that the thresholds can be evaluated.
    pub fn validate(&self) -> Result<(), EvalError> {
        let in_unit = |v: &f64| (0.0..=1.0).contains(v);
        if self.iou_thresholds.is_empty() || !self.iou_thresholds.iter().all(in_unit) {
            return Err(EvalError::InvalidConfig(
                "iou thresholds must be a non-empty list of values in [0, 1]".to_string(),
            ));
        }
        if self.rec_thresholds.is_empty()
            || !self.rec_thresholds.iter().all(in_unit)
            || self.rec_thresholds.windows(2).any(|w| w[0] > w[1])
        {
            return Err(EvalError::InvalidConfig(
                "recall thresholds must be a non-empty ascending list of values in [0, 1]"
                    .to_string(),
            ));
        }
        if self.max_detection_thresholds.is_empty() || self.max_detection_thresholds.contains(&0) {
            return Err(EvalError::InvalidConfig(
                "max detection thresholds must be a non-empty list of positive values".to_string(),
            ));
        }
        let AreaRanges { small, medium } = self.area_ranges;
        if !(0.0 <= small && small <= medium) {
            return Err(EvalError::InvalidConfig(format!(
                "area cutoffs must satisfy 0 <= small <= medium, got {small} and {medium}"
            )));
        }
        Ok(())
    }

    fn iou_index(&self, iou: f64) -> Option<usize> {
        self.iou_thresholds
            .iter()
            .position(|&t| (t - iou).abs() < 1e-9)
    }
}

/// Result of a mean average precision evaluation.
///
/// Metrics without any ground truth to evaluate are reported as `-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapResult {
    /// AP over all IoU thresholds.
    pub map: f64,
    /// AP at IoU 0.50.
    pub map_50: f64,
    /// AP at IoU 0.75.
    pub map_75: f64,
    /// AP of small boxes.
    pub map_small: f64,
    /// AP of medium boxes.
    pub map_medium: f64,
    /// AP of large boxes.
    pub map_large: f64,
    /// AR per max detection threshold, keyed `mar_<N>`.
    #[serde(flatten)]
    pub mar: BTreeMap<String, f64>,
    /// AR of small boxes.
    pub mar_small: f64,
    /// AR of medium boxes.
    pub mar_medium: f64,
    /// AR of large boxes.
    pub mar_large: f64,
    /// AP of every class in `classes`.
    #[serde(default)]
    pub map_per_class: Vec<f64>,
    /// AR of every class in `classes`, at the largest max detection threshold.
    #[serde(default)]
    pub mar_per_class: Vec<f64>,
    /// Class ids seen in predictions or targets, ascending.
    #[serde(default)]
    pub classes: Vec<i64>,
    /// Interpolated precision indexed `[iou][recall][area][max_det]`, averaged over classes.
    pub precision: Vec<Vec<Vec<Vec<f64>>>>,
    /// Detection score at each interpolated recall point, indexed like `precision`.
    #[serde(default)]
    pub scores: Vec<Vec<Vec<Vec<f64>>>>,
    /// Recall indexed `[iou][area][max_det]`, averaged over classes.
    pub recall: Vec<Vec<Vec<f64>>>,
}

impl MapResult {
    /// The average recall at a max detection threshold.
    pub fn mar(&self, max_det: usize) -> Option<f64> {
        self.mar.get(&format!("mar_{max_det}")).copied()
    }

    fn mar_sorted(&self) -> Vec<(usize, f64)> {
        let mut mar = self
            .mar
            .iter()
            .filter_map(|(k, &v)| Some((k.strip_prefix("mar_")?.parse::<usize>().ok()?, v)))
            .collect::<Vec<_>>();
        mar.sort_by_key(|(n, _)| *n);
        mar
    }

    /// The scalar metrics in report order.
    pub fn summary(&self) -> Vec<(String, f64)> {
        let mut summary = vec![
            ("map".to_string(), self.map),
            ("map_50".to_string(), self.map_50),
            ("map_75".to_string(), self.map_75),
            ("map_small".to_string(), self.map_small),
            ("map_medium".to_string(), self.map_medium),
            ("map_large".to_string(), self.map_large),
        ];
        summary.extend(
            self.mar_sorted()
                .into_iter()
                .map(|(n, v)| (format!("mar_{n}"), v)),
        );
        summary.extend([
            ("mar_small".to_string(), self.mar_small),
            ("mar_medium".to_string(), self.mar_medium),
            ("mar_large".to_string(), self.mar_large),
        ]);
        summary
    }

    /// Write the result as an indented JSON document.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), EvalError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a result written by [`MapResult::save_json`].
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, EvalError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl fmt::Display for MapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.summary() {
            writeln!(f, "{name:<12}{value:>8.4}")?;
        }
        Ok(())
    }
}

/// Boxes of one class in one image, detections sorted by score and truncated.
struct ClassImage {
    gt: Vec<[f64; 4]>,
    dt: Vec<[f64; 4]>,
    scores: Vec<f64>,
    // [dt][gt]
    ious: Vec<Vec<f64>>,
}

impl ClassImage {
    fn new(prediction: &Detection, target: &Target, label: i64, max_det: usize) -> Self {
        let gt = target
            .boxes
            .iter()
            .zip(&target.labels)
            .filter(|(_, &l)| l == label)
            .map(|(b, _)| *b)
            .collect::<Vec<_>>();

        let mut dt = prediction
            .boxes
            .iter()
            .zip(&prediction.scores)
            .zip(&prediction.labels)
            .filter(|(_, &l)| l == label)
            .map(|((b, &s), _)| (*b, s))
            .collect::<Vec<_>>();
        dt.sort_by(|a, b| b.1.total_cmp(&a.1));
        dt.truncate(max_det);

        let (dt, scores): (Vec<_>, Vec<_>) = dt.into_iter().unzip();
        let ious = box_iou_matrix(&dt, &gt);

        Self {
            gt,
            dt,
            scores,
            ious,
        }
    }

    fn is_empty(&self) -> bool {
        self.gt.is_empty() && self.dt.is_empty()
    }
}

/// Matching of one class in one image for one area range.
struct ImageEval {
    scores: Vec<f64>,
    // [iou][dt]
    dt_matched: Vec<Vec<bool>>,
    // [iou][dt]
    dt_ignore: Vec<Vec<bool>>,
    gt_ignore: Vec<bool>,
}

impl ImageEval {
    fn new(ci: &ClassImage, range: [f64; 2], iou_thresholds: &[f64]) -> Option<Self> {
        if ci.is_empty() {
            return None;
        }
        let outside = |b: &[f64; 4]| {
            let area = box_area(b);
            area < range[0] || area > range[1]
        };

        // ground truth inside the range comes first
        let mut gt_order = (0..ci.gt.len()).collect::<Vec<_>>();
        gt_order.sort_by_key(|&g| outside(&ci.gt[g]));
        let gt_ignore = gt_order
            .iter()
            .map(|&g| outside(&ci.gt[g]))
            .collect::<Vec<_>>();

        let num_dt = ci.dt.len();
        let mut dt_matched = vec![vec![false; num_dt]; iou_thresholds.len()];
        let mut dt_ignore = vec![vec![false; num_dt]; iou_thresholds.len()];

        for (t, &threshold) in iou_thresholds.iter().enumerate() {
            let mut gt_matched = vec![false; gt_order.len()];
            for d in 0..num_dt {
                let mut best_iou = threshold.min(1.0 - 1e-10);
                let mut best: Option<usize> = None;
                for (i, &g) in gt_order.iter().enumerate() {
                    if gt_matched[i] {
                        continue;
                    }
                    // ignored ground truth only matches when nothing else did
                    if best.is_some_and(|m| !gt_ignore[m]) && gt_ignore[i] {
                        break;
                    }
                    if ci.ious[d][g] < best_iou {
                        continue;
                    }
                    best_iou = ci.ious[d][g];
                    best = Some(i);
                }
                if let Some(m) = best {
                    dt_ignore[t][d] = gt_ignore[m];
                    dt_matched[t][d] = true;
                    gt_matched[m] = true;
                }
            }
            for d in 0..num_dt {
                if !dt_matched[t][d] && outside(&ci.dt[d]) {
                    dt_ignore[t][d] = true;
                }
            }
        }

        Some(Self {
            scores: ci.scores.clone(),
            dt_matched,
            dt_ignore,
            gt_ignore,
        })
    }
}

/// Per-class precision and recall arrays.
struct Accumulated {
    num_classes: usize,
    num_areas: usize,
    num_max_dets: usize,
    num_recalls: usize,
    // [iou][recall][class][area][max_det]
    precision: Vec<f64>,
    // same layout as precision
    scores: Vec<f64>,
    // [iou][class][area][max_det]
    recall: Vec<f64>,
}

impl Accumulated {
    fn new(t: usize, r: usize, k: usize, a: usize, m: usize) -> Self {
        Self {
            num_classes: k,
            num_areas: a,
            num_max_dets: m,
            num_recalls: r,
            precision: vec![MISSING; t * r * k * a * m],
            scores: vec![MISSING; t * r * k * a * m],
            recall: vec![MISSING; t * k * a * m],
        }
    }

    fn precision_idx(&self, t: usize, r: usize, k: usize, a: usize, m: usize) -> usize {
        (((t * self.num_recalls + r) * self.num_classes + k) * self.num_areas + a)
            * self.num_max_dets
            + m
    }

    fn recall_idx(&self, t: usize, k: usize, a: usize, m: usize) -> usize {
        ((t * self.num_classes + k) * self.num_areas + a) * self.num_max_dets + m
    }
}

fn mean_valid(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|&v| v > MISSING)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        MISSING
    } else {
        sum / count as f64
    }
}

/// Accumulating mean average precision evaluator.
///
/// Detections are matched to ground truth of the same class per image, greedily
/// by descending score, at every IoU threshold. Precision is interpolated at the
/// recall thresholds and averaged over classes, IoU thresholds and area ranges.
///
/// Example:
/// ```
/// use scenechange_eval::{
///     detection::{Detection, Target},
///     map::{MapConfig, MapEvaluator},
/// };
///
/// let mut evaluator = MapEvaluator::new(MapConfig::default()).unwrap();
/// let boxes = vec![[10.0, 10.0, 50.0, 60.0]];
/// evaluator
///     .update(
///         &[Detection { boxes: boxes.clone(), scores: vec![1.0], labels: vec![0] }],
///         &[Target { image: "rgb_0000.png".to_string(), boxes, labels: vec![0] }],
///     )
///     .unwrap();
/// let result = evaluator.compute();
/// assert!((result.map - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct MapEvaluator {
    config: MapConfig,
    predictions: Vec<Detection>,
    targets: Vec<Target>,
}

impl MapEvaluator {
    /// Create an evaluator, sorting the max detection thresholds.
    pub fn new(mut config: MapConfig) -> Result<Self, EvalError> {
        config.validate()?;
        config.max_detection_thresholds.sort_unstable();
        Ok(Self {
            config,
            predictions: Vec::new(),
            targets: Vec::new(),
        })
    }

    /// The evaluation thresholds.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Add the predictions and targets of a batch of images.
    ///
    /// # Errors
    ///
    /// * [`EvalError::MismatchedBatch`] if the number of predictions and targets differ.
    /// * [`EvalError::InvalidRecord`] if a record has inconsistent field lengths.
    pub fn update(&mut self, predictions: &[Detection], targets: &[Target]) -> Result<(), EvalError> {
        if predictions.len() != targets.len() {
            return Err(EvalError::MismatchedBatch {
                predictions: predictions.len(),
                targets: targets.len(),
            });
        }
        for (i, (p, t)) in predictions.iter().zip(targets).enumerate() {
            p.validate(i)?;
            t.validate(i)?;
        }
        self.predictions.extend_from_slice(predictions);
        self.targets.extend_from_slice(targets);
        Ok(())
    }

    /// Forget every image added so far.
    pub fn reset(&mut self) {
        self.predictions.clear();
        self.targets.clear();
    }

    /// Number of images added so far.
    pub fn num_images(&self) -> usize {
        self.predictions.len()
    }

    fn classes(&self) -> Vec<i64> {
        let mut classes = self
            .predictions
            .iter()
            .flat_map(|p| p.labels.iter())
            .chain(self.targets.iter().flat_map(|t| t.labels.iter()))
            .copied()
            .collect::<Vec<_>>();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Evaluate every image added so far.
    pub fn compute(&self) -> MapResult {
        let config = &self.config;
        let classes = self.classes();
        let ranges = config.area_ranges.ranges();
        let max_dets = &config.max_detection_thresholds;
        let largest_max_det = max_dets.last().copied().unwrap_or(usize::MAX);

        // [image][class][area]
        let evals = self
            .predictions
            .par_iter()
            .zip(self.targets.par_iter())
            .map(|(prediction, target)| {
                classes
                    .iter()
                    .map(|&label| {
                        let ci = ClassImage::new(prediction, target, label, largest_max_det);
                        ranges
                            .iter()
                            .map(|&range| ImageEval::new(&ci, range, &config.iou_thresholds))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let acc = self.accumulate(&evals, classes.len());

        log::debug!(
            "evaluated {} images over {} classes",
            self.predictions.len(),
            classes.len()
        );

        self.summarize(&acc, classes)
    }

    fn accumulate(&self, evals: &[Vec<Vec<Option<ImageEval>>>], num_classes: usize) -> Accumulated {
        let config = &self.config;
        let num_ious = config.iou_thresholds.len();
        let num_areas = AREA_NAMES.len();
        let mut acc = Accumulated::new(
            num_ious,
            config.rec_thresholds.len(),
            num_classes,
            num_areas,
            config.max_detection_thresholds.len(),
        );

        for k in 0..num_classes {
            for a in 0..num_areas {
                let images = evals
                    .iter()
                    .filter_map(|e| e[k][a].as_ref())
                    .collect::<Vec<_>>();
                let num_gt = images
                    .iter()
                    .map(|e| e.gt_ignore.iter().filter(|&&ig| !ig).count())
                    .sum::<usize>();
                if num_gt == 0 {
                    continue;
                }

                for (m, &max_det) in config.max_detection_thresholds.iter().enumerate() {
                    // (image, detection) pairs by descending score
                    let mut dets = images
                        .iter()
                        .enumerate()
                        .flat_map(|(i, e)| (0..e.scores.len().min(max_det)).map(move |d| (i, d)))
                        .collect::<Vec<_>>();
                    dets.sort_by(|&(ia, da), &(ib, db)| {
                        images[ib].scores[db].total_cmp(&images[ia].scores[da])
                    });
                    let num_dets = dets.len();

                    for t in 0..num_ious {
                        let (mut tp, mut fp) = (0.0f64, 0.0f64);
                        let mut rc = Vec::with_capacity(num_dets);
                        let mut pr = Vec::with_capacity(num_dets);
                        for &(i, d) in &dets {
                            if !images[i].dt_ignore[t][d] {
                                if images[i].dt_matched[t][d] {
                                    tp += 1.0;
                                } else {
                                    fp += 1.0;
                                }
                            }
                            rc.push(tp / num_gt as f64);
                            pr.push(tp / (tp + fp + f64::EPSILON));
                        }

                        let idx = acc.recall_idx(t, k, a, m);
                        acc.recall[idx] = rc.last().copied().unwrap_or(0.0);

                        // precision envelope
                        for i in (1..pr.len()).rev() {
                            if pr[i] > pr[i - 1] {
                                pr[i - 1] = pr[i];
                            }
                        }

                        for (r, &threshold) in config.rec_thresholds.iter().enumerate() {
                            let pos = rc.partition_point(|&x| x < threshold);
                            let idx = acc.precision_idx(t, r, k, a, m);
                            acc.precision[idx] = pr.get(pos).copied().unwrap_or(0.0);
                            acc.scores[idx] = dets
                                .get(pos)
                                .map_or(0.0, |&(i, d)| images[i].scores[d]);
                        }
                    }
                }
            }
        }

        acc
    }

    fn summarize(&self, acc: &Accumulated, classes: Vec<i64>) -> MapResult {
        let config = &self.config;
        let num_ious = config.iou_thresholds.len();
        let num_recalls = config.rec_thresholds.len();
        let num_classes = classes.len();
        let num_areas = AREA_NAMES.len();
        let num_max_dets = config.max_detection_thresholds.len();
        let last = num_max_dets - 1;

        let average_precision = |ious: &[usize], ks: &[usize], a: usize, m: usize| {
            mean_valid(ious.iter().flat_map(|&t| {
                (0..num_recalls).flat_map(move |r| {
                    ks.iter()
                        .map(move |&k| acc.precision[acc.precision_idx(t, r, k, a, m)])
                })
            }))
        };
        let average_recall = |ks: &[usize], a: usize, m: usize| {
            mean_valid((0..num_ious).flat_map(|t| {
                ks.iter().map(move |&k| acc.recall[acc.recall_idx(t, k, a, m)])
            }))
        };

        let all_ious = (0..num_ious).collect::<Vec<_>>();
        let all_classes = (0..num_classes).collect::<Vec<_>>();
        let at_iou = |iou: f64| match config.iou_index(iou) {
            Some(t) => average_precision(&[t], &all_classes, 0, last),
            None => MISSING,
        };

        let mar: BTreeMap<String, f64> = config
            .max_detection_thresholds
            .iter()
            .enumerate()
            .map(|(m, n)| (format!("mar_{n}"), average_recall(&all_classes, 0, m)))
            .collect();

        // [iou][recall][area][max_det], averaged over classes
        let class_averaged = |values: &[f64]| -> Vec<Vec<Vec<Vec<f64>>>> {
            (0..num_ious)
                .map(|t| {
                    (0..num_recalls)
                        .map(|r| {
                            (0..num_areas)
                                .map(|a| {
                                    (0..num_max_dets)
                                        .map(|m| {
                                            mean_valid((0..num_classes).map(|k| {
                                                values[acc.precision_idx(t, r, k, a, m)]
                                            }))
                                        })
                                        .collect()
                                })
                                .collect()
                        })
                        .collect()
                })
                .collect()
        };
        let precision = class_averaged(&acc.precision);
        let scores = class_averaged(&acc.scores);
        let recall: Vec<Vec<Vec<f64>>> = (0..num_ious)
            .map(|t| {
                (0..num_areas)
                    .map(|a| {
                        (0..num_max_dets)
                            .map(|m| {
                                mean_valid(
                                    (0..num_classes)
                                        .map(|k| acc.recall[acc.recall_idx(t, k, a, m)]),
                                )
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        MapResult {
            map: average_precision(&all_ious, &all_classes, 0, last),
            map_50: at_iou(0.5),
            map_75: at_iou(0.75),
            map_small: average_precision(&all_ious, &all_classes, 1, last),
            map_medium: average_precision(&all_ious, &all_classes, 2, last),
            map_large: average_precision(&all_ious, &all_classes, 3, last),
            mar,
            mar_small: average_recall(&all_classes, 1, last),
            mar_medium: average_recall(&all_classes, 2, last),
            mar_large: average_recall(&all_classes, 3, last),
            map_per_class: (0..num_classes)
                .map(|k| average_precision(&all_ious, &[k], 0, last))
                .collect(),
            mar_per_class: (0..num_classes)
                .map(|k| average_recall(&[k], 0, last))
                .collect(),
            classes,
            precision,
            scores,
            recall,
        }
    }
}

/// Evaluate a batch of predictions against their targets in one call.
pub fn compute_map(
    predictions: &[Detection],
    targets: &[Target],
    config: MapConfig,
) -> Result<MapResult, EvalError> {
    let mut evaluator = MapEvaluator::new(config)?;
    evaluator.update(predictions, targets)?;
    Ok(evaluator.compute())
}
