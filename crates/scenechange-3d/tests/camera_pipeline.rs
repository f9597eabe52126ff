use scenechange_3d::{
    camera::{CameraExtrinsics, CameraIntrinsics},
    frustum::{self, FieldOfView, FrustumError},
    io::annotation::AnnotationIndex,
    pointcloud::PointCloud,
    projection::{project_points, project_with_intrinsics},
};

fn intrinsics() -> Result<CameraIntrinsics, Box<dyn std::error::Error>> {
    Ok(CameraIntrinsics::new(
        500.0,
        500.0,
        320.0,
        240.0,
        640,
        480,
        Some([0.0; 5]),
    )?)
}

#[test]
fn point_on_optical_axis_hits_principal_point() -> Result<(), Box<dyn std::error::Error>> {
    let intrinsics = intrinsics()?;
    let (u, v) = project_points(
        &[[0.0, 0.0, 5.0]],
        &intrinsics.homogeneous_matrix(),
        &intrinsics.distortion_coeffs(),
        intrinsics.width,
        intrinsics.height,
    )?;
    assert_eq!((u[0], v[0]), (320, 240));
    Ok(())
}

#[test]
fn narrow_and_wide_fov() {
    let points = [[0.5, 0.5, 5.0]];
    assert_eq!(frustum::cull_single_fov(&points, 1.0), Err(FrustumError::Empty));
    assert_eq!(frustum::cull_single_fov(&points, 180.0), Ok(vec![0]));
}

#[test]
fn world_cloud_to_pixels() -> Result<(), Box<dyn std::error::Error>> {
    // camera placed 5m behind the origin, looking along +z
    let extrinsics = CameraExtrinsics::from_quaternion(1.0, 0.0, 0.0, 0.0, &[0.0, 0.0, -5.0])?;
    let intrinsics = intrinsics()?;

    let cloud = PointCloud::from_points(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 0.5, 0.0],
        [50.0, 0.0, 0.0],
        [0.0, 0.0, -10.0],
    ]);
    let annotations = AnnotationIndex::parse_str("box 0 1 2 3\nfar_away 3 1\n")?;
    annotations.validate_against(cloud.len())?;

    let camera_cloud = cloud.transform(&extrinsics.pose_matrix());

    let object = camera_cloud.select_by_index(annotations.get("box").unwrap_or_default())?;
    let visible = FieldOfView::default().cull(object.points())?;
    assert_eq!(visible, vec![0, 1, 2]);

    let visible = object.select_by_index(&visible)?;
    let (u, v) = project_with_intrinsics(visible.points(), &intrinsics)?;
    assert_eq!(u, vec![320, 420, 320]);
    assert_eq!(v, vec![240, 240, 290]);

    let far_away = camera_cloud.select_by_index(annotations.get("far_away").unwrap_or_default())?;
    assert_eq!(FieldOfView::default().cull(far_away.points()), Err(FrustumError::Empty));
    Ok(())
}

#[test]
fn lookat_target_projects_to_principal_point() -> Result<(), Box<dyn std::error::Error>> {
    let lookat = CameraExtrinsics::from_lookat(&[0.0, 0.0, 0.0], &[0.0, 0.0, -1.0], &[0.0, 1.0, 0.0], 1.0, 5.0)?;
    let points = lookat.transform_points(&[[0.0, 0.0, 0.0]]);
    assert!((points[0][2].abs() - 5.0).abs() < 1e-12);

    let (u, v) = project_with_intrinsics(&points, &intrinsics()?)?;
    assert_eq!((u[0], v[0]), (320, 240));
    Ok(())
}
