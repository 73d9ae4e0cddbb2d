use keymatch::{
    Border, Image, ImageView, KeyMatchError, Keypoint, Oriented, OrientedPoint, Point, ScalePoint,
    Scaled, Transform2d,
};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0u8; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        KeyMatchError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );
}

#[test]
fn image_view_rejects_invalid_stride() {
    let data = [0u8; 8];

    let err = ImageView::new(&data, 4, 1, 3).err().unwrap();
    assert_eq!(
        err,
        KeyMatchError::InvalidStride {
            width: 4,
            stride: 3,
        }
    );
}

#[test]
fn image_from_u8_view_scales_to_unit_range() {
    let data = [0u8, 51, 255, 102];
    let view = ImageView::from_slice(&data, 2, 2).unwrap();
    let img = Image::from_view_u8(view).unwrap();
    assert_eq!(img.dims(), (2, 2));
    assert_eq!(img.at(0, 0), 0.0);
    assert!((img.at(0, 1) - 0.2).abs() < 1e-6);
    assert!((img.at(1, 0) - 1.0).abs() < 1e-6);
}

#[test]
fn image_from_vec_checks_length() {
    let err = Image::from_vec(vec![0.0; 5], 2, 3, 1).err().unwrap();
    assert_eq!(err, KeyMatchError::BufferTooSmall { needed: 6, got: 5 });
}

#[test]
fn border_policies_are_total_and_deterministic() {
    let img = Image::from_fn(3, 4, |r, c| (r * 4 + c + 1) as f32).unwrap();
    let far = [-1_000_003isize, -9, -5, -1, 0, 2, 3, 4, 7, 1_000_001];
    for border in [
        Border::Constant,
        Border::Replicate,
        Border::Reflect,
        Border::Wrap,
    ] {
        for &r in &far {
            for &c in &far {
                let a = border.sample(&img, r, c);
                let b = border.sample(&img, r, c);
                assert!(a.is_finite());
                assert_eq!(a, b);
            }
        }
    }

    assert_eq!(Border::Constant.sample(&img, -1, 0), 0.0);
    assert_eq!(Border::Constant.sample(&img, 0, 4), 0.0);
    // Replicate clamps to the edge pixel.
    assert_eq!(Border::Replicate.sample(&img, -7, 9), img.at(0, 3));
    // Reflect mirrors without repeating the edge: index -1 reads index 1.
    assert_eq!(Border::Reflect.sample(&img, -1, 0), img.at(1, 0));
    assert_eq!(Border::Reflect.sample(&img, 0, 4), img.at(0, 2));
    // Wrap is periodic.
    assert_eq!(Border::Wrap.sample(&img, 3, -1), img.at(0, 3));
    assert_eq!(Border::Wrap.sample(&img, -1_000_003, 0), img.at(2, 0));
}

#[test]
fn keypoint_accessors_share_one_interface() {
    fn position<K: Keypoint>(k: &K) -> (f32, f32) {
        (k.x(), k.y())
    }

    let p = Point::new(3.0, 5.0, 0.7);
    assert_eq!(position(&p), (5.0, 3.0));

    let o = OrientedPoint::from_point(p, 1.25);
    assert_eq!(o.angle(), 1.25);
    assert_eq!(o.with_angle(0.5).angle, 0.5);

    let s = ScalePoint {
        row: 10.0,
        col: 14.0,
        local_row: 5.25,
        local_col: 6.75,
        octave: 1,
        layer: 2,
        sigma: 2.0,
        sigma_global: 4.0,
        ..ScalePoint::default()
    };
    assert_eq!(position(&s), (13.5, 10.5));
    assert_eq!(s.sigma_global(), 4.0);
    assert!(s.same_location(&s.with_angle(2.0)));
}

#[test]
fn transform_decomposes_similarity() {
    let t = Transform2d::similarity(std::f64::consts::FRAC_PI_2, 2.0, 10.0, -3.0);
    let (angle, scale) = t.rotation_scale();
    assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert!((scale - 2.0).abs() < 1e-12);
    assert!(t.is_affine());
    let (u, v) = t.apply(1.0, 0.0).unwrap();
    assert!((u - 10.0).abs() < 1e-12 && (v - -1.0).abs() < 1e-12);
}
