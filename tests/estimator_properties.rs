//! End-to-end properties of the estimator on synthetic image pairs.

use imgalign::{
    estimate, AffineTransform2D, AlignError, AlignmentImage, AlignmentRequest, AlignmentType,
    Annotation, InMemoryImage, Point2, Roi, TransformationType,
};

const WIDTH: usize = 500;
const HEIGHT: usize = 500;
const BOTH: [TransformationType; 2] = [TransformationType::Affine, TransformationType::Rigid];

/// Ramp plus a product term, wrapped to 8 bits.
fn make_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = 20 + 10 * x + 5 * y + (x * y) % 15;
            data.push((value % 256) as u8);
        }
    }
    data
}

/// Copy moved by `shift` pixels right and down, zero-filled.
fn shifted(data: &[u8], width: usize, height: usize, shift: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for y in shift..height {
        for x in shift..width {
            out[y * width + x] = data[(y - shift) * width + (x - shift)];
        }
    }
    out
}

fn assert_translation(t: &AffineTransform2D, expected: f64, tol: f64) {
    let want = AffineTransform2D::translation(expected, expected);
    assert!(
        t.approx_eq(&want, tol),
        "expected translation ({expected}, {expected}) within {tol}, got {t:?}"
    );
}

fn intensity_case(shift: usize, initial: f64, downsample: f64, ty: TransformationType) -> AffineTransform2D {
    intensity_case_sized(WIDTH, shift, initial, downsample, ty)
}

/// Square `side x side` intensity pair.
fn intensity_case_sized(
    side: usize,
    shift: usize,
    initial: f64,
    downsample: f64,
    ty: TransformationType,
) -> AffineTransform2D {
    let base_pixels = make_pixels(side, side);
    let moved_pixels = shifted(&base_pixels, side, side, shift);
    let base = InMemoryImage::from_vec(base_pixels, side, side).unwrap();
    let moved = InMemoryImage::from_vec(moved_pixels, side, side).unwrap();
    let request = AlignmentRequest::new(
        AlignmentImage::new(&base),
        AlignmentImage::new(&moved),
        AlignmentType::Intensity,
        ty,
    )
    .with_initial(AffineTransform2D::translation(initial, initial))
    .with_downsample(downsample);
    estimate(&request).unwrap()
}

fn rectangle(offset: f64) -> Vec<Annotation> {
    vec![Annotation::new(Roi::Rectangle {
        x: WIDTH as f64 / 4.0 + offset,
        y: HEIGHT as f64 / 4.0 + offset,
        width: WIDTH as f64 / 2.0,
        height: HEIGHT as f64 / 2.0,
    })]
}

fn area_case(shift: f64, initial: f64, downsample: f64, ty: TransformationType) -> AffineTransform2D {
    let blank = InMemoryImage::from_vec(vec![0u8; WIDTH * HEIGHT], WIDTH, HEIGHT).unwrap();
    let base_annotations = rectangle(0.0);
    let moved_annotations = rectangle(shift);
    let request = AlignmentRequest::new(
        AlignmentImage::new(&blank).with_annotations(&base_annotations),
        AlignmentImage::new(&blank).with_annotations(&moved_annotations),
        AlignmentType::AreaAnnotations,
        ty,
    )
    .with_initial(AffineTransform2D::translation(initial, initial))
    .with_downsample(downsample);
    estimate(&request).unwrap()
}

fn points(raw: &[(f64, f64)]) -> Vec<Annotation> {
    vec![Annotation::new(Roi::Points(
        raw.iter().map(|&(x, y)| Point2::new(x, y)).collect(),
    ))]
}

fn point_case(
    base: &[Annotation],
    moved: &[Annotation],
    ty: TransformationType,
) -> Result<AffineTransform2D, AlignError> {
    let blank = InMemoryImage::from_vec(vec![0u8; 16], 4, 4).unwrap();
    let request = AlignmentRequest::new(
        AlignmentImage::new(&blank).with_annotations(base),
        AlignmentImage::new(&blank).with_annotations(moved),
        AlignmentType::PointAnnotations,
        ty,
    );
    estimate(&request)
}

const BASE_POINTS: [(f64, f64); 4] = [(3.5, 6.78), (10.0, 0.1), (46.0, 8.4), (78.0, 80.0)];

#[test]
fn intensity_same_image_is_identity() {
    for ty in BOTH {
        assert_translation(&intensity_case(0, 0.0, 1.0, ty), 0.0, 0.001);
    }
}

#[test]
fn intensity_recovers_small_shift() {
    for ty in BOTH {
        assert_translation(&intensity_case(3, 0.0, 1.0, ty), 3.0, 0.2);
    }
}

#[test]
fn intensity_recovers_large_shift_from_close_seed() {
    for ty in BOTH {
        assert_translation(&intensity_case(20, 19.0, 1.0, ty), 20.0, 0.2);
    }
}

#[test]
fn intensity_result_is_in_full_resolution() {
    // Halving the 8-bit ramp folds its wrap edges into 2x2 averages; the
    // larger image keeps enough clean texture for a sub-pixel fit.
    for ty in BOTH {
        assert_translation(&intensity_case_sized(2000, 1, 0.0, 2.0, ty), 1.0, 0.5);
    }
}

#[test]
fn area_same_annotations_is_identity() {
    for ty in BOTH {
        assert_translation(&area_case(0.0, 0.0, 1.0, ty), 0.0, 0.001);
    }
}

#[test]
fn area_recovers_small_shift() {
    for ty in BOTH {
        assert_translation(&area_case(3.0, 0.0, 1.0, ty), 3.0, 0.1);
    }
}

#[test]
fn area_recovers_large_shift_from_close_seed() {
    for ty in BOTH {
        assert_translation(&area_case(20.0, 19.0, 1.0, ty), 20.0, 0.1);
    }
}

#[test]
fn area_result_is_in_full_resolution() {
    for ty in BOTH {
        assert_translation(&area_case(10.0, 0.0, 2.0, ty), 10.0, 0.1);
    }
}

#[test]
fn points_identical_sets_give_identity() {
    let base = points(&BASE_POINTS);
    for ty in BOTH {
        let t = point_case(&base, &base, ty).unwrap();
        assert_translation(&t, 0.0, 1e-9);
    }
}

#[test]
fn points_recover_shift() {
    let base = points(&BASE_POINTS);
    let moved: Vec<(f64, f64)> = BASE_POINTS.iter().map(|&(x, y)| (x + 20.0, y + 20.0)).collect();
    let moved = points(&moved);
    for ty in BOTH {
        let t = point_case(&base, &moved, ty).unwrap();
        assert_translation(&t, 20.0, 1e-3);
    }
}

#[test]
fn points_come_from_lines_too_and_skip_areas() {
    let base = vec![
        Annotation::new(Roi::Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 0.0),
        }),
        Annotation::new(Roi::Rectangle {
            x: 0.0,
            y: 0.0,
            width: 5.0,
            height: 5.0,
        }),
        Annotation::new(Roi::Points(vec![Point2::new(0.0, 10.0)])),
    ];
    let moved = points(&[(2.0, 1.0), (12.0, 1.0), (2.0, 11.0)]);
    let t = point_case(&base, &moved, TransformationType::Affine).unwrap();
    assert!(t.approx_eq(&AffineTransform2D::translation(2.0, 1.0), 1e-9));
}

#[test]
fn points_require_matching_counts() {
    let base = points(&BASE_POINTS);
    let moved = points(&BASE_POINTS[..3]);
    assert!(matches!(
        point_case(&base, &moved, TransformationType::Affine),
        Err(AlignError::InvalidArgument(_))
    ));
    assert!(matches!(
        point_case(&[], &[], TransformationType::Rigid),
        Err(AlignError::InvalidArgument(_))
    ));
}

#[test]
fn collinear_points_are_degenerate() {
    let line = points(&[(0.0, 0.0), (1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
    assert!(matches!(
        point_case(&line, &line, TransformationType::Affine),
        Err(AlignError::DegenerateResult { .. })
    ));
}

#[test]
fn empty_label_rasters_do_not_converge() {
    let blank = InMemoryImage::from_vec(vec![0u8; 64 * 64], 64, 64).unwrap();
    let none: Vec<Annotation> = Vec::new();
    let request = AlignmentRequest::new(
        AlignmentImage::new(&blank).with_annotations(&none),
        AlignmentImage::new(&blank).with_annotations(&none),
        AlignmentType::AreaAnnotations,
        TransformationType::Affine,
    );
    assert!(matches!(
        estimate(&request),
        Err(AlignError::Convergence { .. })
    ));
}
