use keymatch::lowlevel::detect_blobs;
use keymatch::{BlobConfig, GaussianPyramid, Image, PyramidConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noise_image(height: usize, width: usize, seed: u64) -> Image {
    let mut rng = StdRng::seed_from_u64(seed);
    Image::from_fn(height, width, |_, _| rng.random_range(0.0..1.0)).unwrap()
}

fn spots_image() -> Image {
    let spots = [(20.0f32, 18.0f32, 2.5f32), (44.0, 50.0, 4.0), (70.0, 30.0, 3.0)];
    Image::from_fn(96, 96, |r, c| {
        spots
            .iter()
            .map(|&(sr, sc, s)| {
                let dr = r as f32 - sr;
                let dc = c as f32 - sc;
                (-(dr * dr + dc * dc) / (2.0 * s * s)).exp()
            })
            .sum()
    })
    .unwrap()
}

#[test]
fn sigma_increases_within_every_octave() {
    let pyr = GaussianPyramid::build(&noise_image(64, 80, 7), &PyramidConfig::default()).unwrap();
    assert!(pyr.num_octaves() >= 2);
    for octave in pyr.octaves() {
        for pair in octave.layers().windows(2) {
            assert!(pair[1].sigma() > pair[0].sigma());
            assert!(pair[1].sigma_global() > pair[0].sigma_global());
        }
    }
}

#[test]
fn octaves_continue_the_global_scale() {
    let cfg = PyramidConfig {
        add_layers: 1,
        ..PyramidConfig::default()
    };
    let pyr = GaussianPyramid::build(&noise_image(64, 64, 11), &cfg).unwrap();
    assert!(pyr.num_octaves() >= 2);
    for pair in pyr.octaves().windows(2) {
        let last = pair[0].layers().last().unwrap();
        let first = &pair[1].layers()[0];
        assert!((first.sigma_global() - last.sigma_global()).abs() < 1e-4);
        assert_eq!(first.sigma(), cfg.sigma_zero);
        let (h0, w0) = pair[0].dims();
        assert_eq!(pair[1].dims(), (h0 / 2, w0 / 2));
    }
}

#[test]
fn layer_iterator_is_restartable() {
    let pyr = GaussianPyramid::build(&noise_image(32, 32, 3), &PyramidConfig::default()).unwrap();
    let total: usize = pyr.octaves().iter().map(|o| o.len()).sum();
    assert_eq!(pyr.layers().count(), total);
    assert_eq!(pyr.layers().count(), total);
    let (octave, layer, _) = pyr.layers().last().unwrap();
    assert_eq!(octave, pyr.num_octaves() - 1);
    assert_eq!(layer, pyr.config().layers_per_octave() - 1);
}

#[test]
fn blob_offsets_stay_below_half_a_sample() {
    let img = spots_image();
    let pyr = GaussianPyramid::build(&img, &PyramidConfig::default()).unwrap();
    let dog = pyr.dog().unwrap();
    let blobs = detect_blobs(&dog, &BlobConfig::default()).unwrap();
    assert!(blobs.len() >= 3);
    for blob in &blobs {
        assert!(blob.offset.iter().all(|o| o.abs() <= 0.5), "{blob:?}");
        assert!(blob.layer >= 1 && blob.layer + 1 < dog.layers_per_octave());
        assert!(blob.sigma_global >= blob.sigma);
    }
}

#[test]
fn larger_spots_are_found_at_larger_scales() {
    let blobs_near = |row: f32, col: f32| {
        let img = spots_image();
        let pyr = GaussianPyramid::build(&img, &PyramidConfig::default()).unwrap();
        detect_blobs(&pyr.dog().unwrap(), &BlobConfig::default())
            .unwrap()
            .into_iter()
            .filter(|b| (b.row - row).abs() <= 2.0 && (b.col - col).abs() <= 2.0)
            .max_by(|a, b| a.value.abs().total_cmp(&b.value.abs()))
            .unwrap()
    };
    let small = blobs_near(20.0, 18.0);
    let large = blobs_near(44.0, 50.0);
    assert!(large.sigma_global > small.sigma_global);
}

#[test]
fn zero_image_has_no_blobs() {
    let img = Image::new(64, 64, 1).unwrap();
    let pyr = GaussianPyramid::build(&img, &PyramidConfig::default()).unwrap();
    let blobs = detect_blobs(&pyr.dog().unwrap(), &BlobConfig::default()).unwrap();
    assert!(blobs.is_empty());
}
