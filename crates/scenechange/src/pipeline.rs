use std::{collections::BTreeMap, ops::AddAssign, path::Path};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use scenechange_3d::{
    camera::{
        pose::{load_transformations, PoseSource, TransformationRecord},
        CameraError, CameraExtrinsics, CameraIntrinsics,
    },
    frustum::{FieldOfView, FrustumError},
    io::annotation::{AnnotationError, AnnotationIndex},
    pointcloud::{PointCloud, PointCloudError},
    projection::{project_with_intrinsics, ProjectionError},
};
use scenechange_bbox::{
    extract::{extract, filter_by_area},
    BBox, BBoxError, ImageSize,
};
use scenechange_eval::detection::Target;

/// Color of annotated ground-truth points.
pub const GT_COLOR: [f64; 3] = [0.1, 0.9, 0.1];

/// Errors that abort the annotation of a scene.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline configuration is unusable.
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Error loading camera or pose records.
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// The annotation does not fit the point cloud.
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// A point selection failed.
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),

    /// Projection was called with malformed input.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Box extraction or resizing failed.
    #[error(transparent)]
    BBox(#[from] BBoxError),
}

/// Parameters of the annotation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Field of view used for culling.
    pub fov: FieldOfView,
    /// Resolution the boxes are rescaled to, typically the model input size.
    pub target_size: Option<ImageSize>,
    /// Boxes with a smaller area, after resizing, are dropped.
    pub min_area: u64,
    /// Color used by [`paint_ground_truth`].
    pub gt_color: [f64; 3],
    /// Class id of the produced boxes.
    pub label: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fov: FieldOfView::default(),
            target_size: None,
            min_area: 0,
            gt_color: GT_COLOR,
            label: 0,
        }
    }
}

impl PipelineConfig {
    /// Check the configuration before running a scene.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fov_ok = |deg: f64| deg > 0.0 && deg <= 180.0;
        if !fov_ok(self.fov.x_deg) || !fov_ok(self.fov.y_deg) {
            return Err(PipelineError::InvalidConfig(format!(
                "field of view must be in (0, 180] degrees, got {}x{}",
                self.fov.x_deg, self.fov.y_deg
            )));
        }
        if let Some(size) = self.target_size {
            if size.width == 0 || size.height == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "target size must be positive, got {size}"
                )));
            }
        }
        Ok(())
    }
}

/// A camera viewpoint of a scene and the image captured from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    /// Image captured from this viewpoint.
    pub file_name: String,
    /// Pose of the camera.
    pub pose: PoseSource,
}

impl Viewpoint {
    /// Create a viewpoint.
    pub fn new(file_name: impl Into<String>, pose: PoseSource) -> Self {
        Self {
            file_name: file_name.into(),
            pose,
        }
    }

    /// Viewpoints of a transformation list, in frame id order.
    pub fn from_transformations(records: &BTreeMap<u64, TransformationRecord>) -> Vec<Self> {
        records
            .values()
            .map(|r| Self::new(r.file_name.clone(), r.pose_source()))
            .collect()
    }

    /// Load the viewpoints of a transformation list file.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>, PipelineError> {
        Ok(Self::from_transformations(&load_transformations(path)?))
    }
}

/// Items skipped while annotating, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Objects with no point inside the field of view.
    pub empty_frustum: usize,
    /// Objects without any projected coordinate.
    pub empty_input: usize,
    /// Viewpoints whose pose could not be built.
    pub invalid_viewpoints: usize,
}

impl SkipCounts {
    /// Total number of skipped items.
    pub fn total(&self) -> usize {
        self.empty_frustum + self.empty_input + self.invalid_viewpoints
    }
}

impl AddAssign for SkipCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.empty_frustum += rhs.empty_frustum;
        self.empty_input += rhs.empty_input;
        self.invalid_viewpoints += rhs.invalid_viewpoints;
    }
}

/// Ground-truth boxes of a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneAnnotation {
    /// One target per usable viewpoint, in viewpoint order.
    pub targets: Vec<Target>,
    /// What was skipped on the way.
    pub skipped: SkipCounts,
}

/// Copy of `cloud` with every annotated point painted in `config.gt_color`.
pub fn paint_ground_truth(
    cloud: &PointCloud,
    annotations: &AnnotationIndex,
    config: &PipelineConfig,
) -> Result<PointCloud, PipelineError> {
    let mut painted = cloud.clone();
    for (_, indices) in annotations.iter() {
        painted.paint(indices, config.gt_color)?;
    }
    Ok(painted)
}

/// Produce the ground-truth boxes of every annotated object for every viewpoint.
///
/// For each viewpoint the world-frame cloud is moved into the camera frame. Each
/// object is then culled against the field of view, projected with `intrinsics`
/// and reduced to its bounding box. Boxes are optionally rescaled to
/// `config.target_size` and filtered by `config.min_area`.
///
/// Viewpoints are processed in parallel and the targets keep the viewpoint order.
/// Objects out of view are skipped and counted. A viewpoint with an unusable pose
/// is skipped with a warning and produces no target.
///
/// # Errors
///
/// Fails on an invalid configuration, on annotation indices outside the cloud and
/// on malformed projection input.
pub fn annotate_scene(
    cloud: &PointCloud,
    annotations: &AnnotationIndex,
    intrinsics: &CameraIntrinsics,
    viewpoints: &[Viewpoint],
    config: &PipelineConfig,
) -> Result<SceneAnnotation, PipelineError> {
    config.validate()?;
    annotations.validate_against(cloud.len())?;

    let results = viewpoints
        .par_iter()
        .map(|viewpoint| annotate_viewpoint(cloud, annotations, intrinsics, viewpoint, config))
        .collect::<Result<Vec<_>, _>>()?;

    let mut scene = SceneAnnotation::default();
    for (target, skipped) in results {
        scene.targets.extend(target);
        scene.skipped += skipped;
    }

    log::info!(
        "annotated {} of {} viewpoints, skipped {} objects out of view and {} viewpoints",
        scene.targets.len(),
        viewpoints.len(),
        scene.skipped.empty_frustum + scene.skipped.empty_input,
        scene.skipped.invalid_viewpoints,
    );

    Ok(scene)
}

fn annotate_viewpoint(
    cloud: &PointCloud,
    annotations: &AnnotationIndex,
    intrinsics: &CameraIntrinsics,
    viewpoint: &Viewpoint,
    config: &PipelineConfig,
) -> Result<(Option<Target>, SkipCounts), PipelineError> {
    let mut skipped = SkipCounts::default();

    let extrinsics = match CameraExtrinsics::from_source(&viewpoint.pose) {
        Ok(extrinsics) => extrinsics,
        Err(e) => {
            log::warn!("skipping viewpoint {}: {e}", viewpoint.file_name);
            skipped.invalid_viewpoints += 1;
            return Ok((None, skipped));
        }
    };

    let camera_cloud = cloud.transform(&extrinsics.pose_matrix());
    let (width, height) = intrinsics.image_size();
    let image_size = ImageSize { width, height };

    let mut boxes = Vec::with_capacity(annotations.len());
    for (label, indices) in annotations.iter() {
        // indices are renumbered by the selection
        let object = camera_cloud.select_by_index(indices)?;

        let visible = match config.fov.cull(object.points()) {
            Ok(visible) => visible,
            Err(FrustumError::Empty) => {
                log::debug!("{label} is out of view in {}", viewpoint.file_name);
                skipped.empty_frustum += 1;
                continue;
            }
        };
        let object = object.select_by_index(&visible)?;

        let (u, v) = project_with_intrinsics(object.points(), intrinsics)?;
        let bbox = match extract(&u, &v) {
            Ok(bbox) => bbox,
            Err(BBoxError::EmptyInput) => {
                log::debug!("{label} has no pixels in {}", viewpoint.file_name);
                skipped.empty_input += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let bbox = match config.target_size {
            Some(to_size) => bbox.resize(image_size, to_size)?,
            None => bbox,
        };
        log::trace!("{label} in {}: {bbox:?}", viewpoint.file_name);
        boxes.push(bbox);
    }

    let boxes: Vec<BBox> = filter_by_area(&boxes, config.min_area);
    let target = Target::from_bboxes(viewpoint.file_name.clone(), &boxes, config.label);
    Ok((Some(target), skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenechange_3d::camera::pose::LookAtRecord;

    const IDENTITY: [[f64; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0, 640, 480, None)
            .expect("valid intrinsics")
    }

    fn scene() -> (PointCloud, AnnotationIndex) {
        let cloud = PointCloud::from_points(vec![
            // cup, in front of the camera
            [-0.1, -0.1, 2.0],
            [0.1, 0.1, 2.0],
            [0.0, 0.05, 2.0],
            // plate, far to the side
            [5.0, 0.0, 1.0],
            [6.0, 0.5, 1.0],
            // background
            [0.0, 0.0, 10.0],
        ]);
        let annotations =
            AnnotationIndex::parse_str("cup 0 1 2 x\nplate 3 4 x\n").expect("valid annotation");
        (cloud, annotations)
    }

    #[test]
    fn test_annotate_identity_viewpoint() -> Result<(), PipelineError> {
        let (cloud, annotations) = scene();
        let viewpoints = [Viewpoint::new("rgb_0000.png", PoseSource::Matrix(IDENTITY))];

        let scene = annotate_scene(
            &cloud,
            &annotations,
            &intrinsics(),
            &viewpoints,
            &PipelineConfig::default(),
        )?;

        assert_eq!(scene.targets.len(), 1);
        let target = &scene.targets[0];
        assert_eq!(target.image, "rgb_0000.png");
        assert_eq!(target.boxes, vec![[295.0, 215.0, 345.0, 265.0]]);
        assert_eq!(target.labels, vec![0]);
        assert_eq!(
            scene.skipped,
            SkipCounts {
                empty_frustum: 1,
                ..Default::default()
            }
        );
        Ok(())
    }

    #[test]
    fn test_resize_and_min_area() -> Result<(), PipelineError> {
        let (cloud, annotations) = scene();
        let viewpoints = [Viewpoint::new("a.png", PoseSource::Matrix(IDENTITY))];
        let config = PipelineConfig {
            target_size: Some(ImageSize {
                width: 320,
                height: 240,
            }),
            ..Default::default()
        };

        let scene = annotate_scene(&cloud, &annotations, &intrinsics(), &viewpoints, &config)?;
        // 295 / 2 = 147.5 rounds to the even neighbour
        assert_eq!(scene.targets[0].boxes, vec![[148.0, 108.0, 172.0, 132.0]]);

        let config = PipelineConfig {
            min_area: 2501,
            ..Default::default()
        };
        let scene = annotate_scene(&cloud, &annotations, &intrinsics(), &viewpoints, &config)?;
        assert_eq!(scene.targets.len(), 1);
        assert!(scene.targets[0].is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_viewpoint_is_skipped() -> Result<(), PipelineError> {
        let (cloud, annotations) = scene();
        let degenerate = LookAtRecord {
            lookat: [0.0, 0.0, 0.0],
            front: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            zoom: 1.0,
        };
        let viewpoints = [
            Viewpoint::new("first.png", PoseSource::Matrix(IDENTITY)),
            Viewpoint::new(
                "broken.png",
                PoseSource::LookAt {
                    record: degenerate,
                    scale: 1.0,
                },
            ),
            Viewpoint::new("singular.png", PoseSource::Matrix([[0.0; 4]; 4])),
            Viewpoint::new("last.png", PoseSource::Matrix(IDENTITY)),
        ];

        let scene = annotate_scene(
            &cloud,
            &annotations,
            &intrinsics(),
            &viewpoints,
            &PipelineConfig::default(),
        )?;

        let images = scene
            .targets
            .iter()
            .map(|t| t.image.as_str())
            .collect::<Vec<_>>();
        assert_eq!(images, vec!["first.png", "last.png"]);
        assert_eq!(scene.skipped.invalid_viewpoints, 2);
        assert_eq!(scene.skipped.empty_frustum, 2);
        assert_eq!(scene.skipped.total(), 4);
        Ok(())
    }

    #[test]
    fn test_annotation_out_of_range() {
        let (cloud, _) = scene();
        let annotations = AnnotationIndex::parse_str("cup 0 99 x\n").expect("valid annotation");
        let res = annotate_scene(
            &cloud,
            &annotations,
            &intrinsics(),
            &[],
            &PipelineConfig::default(),
        );
        assert!(matches!(
            res,
            Err(PipelineError::Annotation(AnnotationError::IndexOutOfRange { index: 99, .. }))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let (cloud, annotations) = scene();
        let config = PipelineConfig {
            target_size: Some(ImageSize {
                width: 0,
                height: 224,
            }),
            ..Default::default()
        };
        let res = annotate_scene(&cloud, &annotations, &intrinsics(), &[], &config);
        assert!(matches!(res, Err(PipelineError::InvalidConfig(_))));

        let config = PipelineConfig {
            fov: FieldOfView::uniform(0.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json() -> Result<(), serde_json::Error> {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"target_size": {"width": 224, "height": 224}, "min_area": 64}"#,
        )?;
        assert_eq!(config.fov, FieldOfView::default());
        assert_eq!(config.target_size, Some(ImageSize::from([224, 224])));
        assert_eq!(config.min_area, 64);
        assert_eq!(config.gt_color, GT_COLOR);
        assert_eq!(config.label, 0);
        Ok(())
    }

    #[test]
    fn test_paint_ground_truth() -> Result<(), PipelineError> {
        let (cloud, annotations) = scene();
        let painted = paint_ground_truth(&cloud, &annotations, &PipelineConfig::default())?;
        assert_eq!(painted.colors()[0], GT_COLOR);
        assert_eq!(painted.colors()[4], GT_COLOR);
        assert_eq!(painted.colors()[5], [0.0, 0.0, 0.0]);
        // the input is left untouched
        assert_eq!(cloud.colors()[0], [0.0, 0.0, 0.0]);

        let config = PipelineConfig {
            gt_color: [1.0, 0.0, 0.0],
            ..Default::default()
        };
        let painted = paint_ground_truth(&cloud, &annotations, &config)?;
        assert_eq!(painted.colors()[2], [1.0, 0.0, 0.0]);
        Ok(())
    }
}
