use aruco_measure::marker::{builtins, render_marker};
use aruco_measure::{
    Annotator, MarkerSelection, MeasureError, MeasureOutcome, MeasureParams, ObjectMeasurer,
};
use approx::assert_relative_eq;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const DARK: Rgb<u8> = Rgb([30, 30, 30]);

fn place_marker(canvas: &mut RgbImage, id: u32, side: u32, x: i64, y: i64) {
    let dict = builtins::builtin_dictionary("DICT_6X6_250").expect("builtin dict");
    let marker = render_marker(&dict, id, side, 0).expect("render marker");
    imageops::overlay(canvas, &DynamicImage::ImageLuma8(marker).to_rgb8(), x, y);
}

fn fill(canvas: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            canvas.put_pixel(x, y, DARK);
        }
    }
}

/// 200 px marker at (20, 40) plus a 100 x 50 px object at (260, 100).
fn scene() -> RgbImage {
    let mut img = RgbImage::from_pixel(400, 300, WHITE);
    place_marker(&mut img, 7, 200, 20, 40);
    fill(&mut img, 260, 100, 100, 50);
    img
}

fn measurer() -> ObjectMeasurer {
    ObjectMeasurer::new(MeasureParams::new(0.10)).expect("measurer")
}

fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("write test image");
    path
}

#[test]
fn marker_sets_scale_and_object_is_measured() {
    let outcome = measurer().measure(&scene());
    let MeasureOutcome::Measured {
        scale,
        markers,
        measurements,
    } = &outcome
    else {
        panic!("expected a measurement, got {outcome:?}");
    };

    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].id, 7);
    assert_relative_eq!(scale.pixels_per_meter(), 2000.0, epsilon = 1.0);
    assert_eq!(measurements.len(), 1, "{measurements:?}");
    assert_eq!(measurements[0].bbox.x, 260);
    assert_eq!(
        outcome.dimension_labels(),
        Some(vec!["5.0cm x 2.5cm".to_string()])
    );
}

#[test]
fn object_against_the_left_edge_is_measured() {
    let mut img = RgbImage::from_pixel(500, 300, WHITE);
    place_marker(&mut img, 7, 200, 260, 40);
    fill(&mut img, 0, 100, 100, 50);

    let outcome = measurer().measure(&img);
    let MeasureOutcome::Measured { measurements, .. } = &outcome else {
        panic!("expected a measurement, got {outcome:?}");
    };
    assert_eq!(measurements.len(), 1, "{measurements:?}");
    assert_eq!(measurements[0].bbox.x, 0);
    assert_eq!(
        outcome.dimension_labels(),
        Some(vec!["5.0cm x 2.5cm".to_string()])
    );
}

#[test]
fn keeping_markers_measures_the_marker_too() {
    let mut params = MeasureParams::new(0.10);
    params.exclude_markers = false;
    let outcome = ObjectMeasurer::new(params).expect("measurer").measure(&scene());

    let labels = outcome.dimension_labels().expect("measured");
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&"10.0cm x 10.0cm".to_string()), "{labels:?}");
    assert!(labels.contains(&"5.0cm x 2.5cm".to_string()), "{labels:?}");
}

#[test]
fn no_marker_means_no_measurements() {
    let mut img = RgbImage::from_pixel(400, 300, WHITE);
    fill(&mut img, 50, 50, 120, 80);
    fill(&mut img, 220, 150, 90, 90);

    let outcome = measurer().measure(&img);
    assert_eq!(outcome, MeasureOutcome::NoMarkerDetected);
    assert_eq!(outcome.dimension_labels(), None);
}

#[test]
fn speckles_give_an_empty_set_not_an_error() {
    let mut img = RgbImage::from_pixel(400, 300, WHITE);
    place_marker(&mut img, 3, 160, 30, 30);
    for (x, y) in [(250, 40), (300, 200), (350, 120), (260, 260)] {
        fill(&mut img, x, y, 5, 5);
    }

    let outcome = measurer().measure(&img);
    assert_eq!(outcome.dimension_labels(), Some(Vec::new()));
}

#[test]
fn measuring_twice_gives_identical_results() {
    let img = scene();
    let m = measurer();
    assert_eq!(m.measure(&img), m.measure(&img));
}

#[test]
fn rejecting_ambiguous_markers() {
    let mut img = RgbImage::from_pixel(500, 260, WHITE);
    place_marker(&mut img, 1, 120, 20, 20);
    place_marker(&mut img, 2, 160, 200, 40);
    fill(&mut img, 400, 60, 60, 60);

    let mut params = MeasureParams::new(0.05);
    params.marker_selection = MarkerSelection::RejectAmbiguous;
    let outcome = ObjectMeasurer::new(params).expect("measurer").measure(&img);
    assert!(matches!(outcome, MeasureOutcome::AmbiguousMarkers { ref markers } if markers.len() == 2));
    assert_eq!(outcome.dimension_labels(), None);

    // the larger marker (160 px for 5 cm) drives the default policy
    let outcome = ObjectMeasurer::new(MeasureParams::new(0.05))
        .expect("measurer")
        .measure(&img);
    let MeasureOutcome::Measured { scale, .. } = outcome else {
        panic!("expected a measurement");
    };
    assert_relative_eq!(scale.pixels_per_meter(), 3200.0, epsilon = 1.0);
}

#[test]
fn unreadable_image_is_a_hard_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("not_an_image.jpg");
    std::fs::write(&path, b"plain text").expect("write");

    assert!(matches!(
        measurer().measure_path(&path),
        Err(MeasureError::UnreadableImage { .. })
    ));
    assert!(matches!(
        measurer().measure_path(dir.path().join("missing.png")),
        Err(MeasureError::UnreadableImage { .. })
    ));
}

#[test]
fn annotated_image_is_written_to_the_requested_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_png(dir.path(), "scene.png", &scene());
    let out = dir.path().join("static").join("object_measurements.png");

    let report = measurer()
        .measure_and_annotate(&input, &Annotator::default(), Some(&out))
        .expect("measure");

    assert_eq!(report.annotated_path.as_deref(), Some(out.as_path()));
    assert!(report.annotation_error.is_none());
    let annotated = image::open(&out).expect("annotated image").to_rgb8();
    assert_eq!(annotated.dimensions(), (400, 300));
    assert_eq!(annotated.get_pixel(260, 100), &Rgb([0, 255, 0]));
}

#[test]
fn annotation_failure_keeps_the_measurements() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_png(dir.path(), "scene.png", &scene());
    let blocker = dir.path().join("static");
    std::fs::write(&blocker, b"a file, not a directory").expect("write");
    let out = blocker.join("object_measurements.jpg");

    let report = measurer()
        .measure_and_annotate(&input, &Annotator::default(), Some(&out))
        .expect("measure");

    assert!(report.annotated_path.is_none());
    assert!(report.annotation_error.is_some());
    assert_eq!(
        report.outcome.dimension_labels(),
        Some(vec!["5.0cm x 2.5cm".to_string()])
    );
}

#[test]
fn nothing_is_written_without_a_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut img = RgbImage::from_pixel(200, 200, WHITE);
    fill(&mut img, 40, 40, 80, 60);
    let input = write_png(dir.path(), "plain.png", &img);
    let out = dir.path().join("annotated.png");

    let report = measurer()
        .measure_and_annotate(&input, &Annotator::default(), Some(&out))
        .expect("measure");

    assert_eq!(report.outcome, MeasureOutcome::NoMarkerDetected);
    assert!(report.annotated_path.is_none());
    assert!(!out.exists());
}
