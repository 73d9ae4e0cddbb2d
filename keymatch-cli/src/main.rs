use clap::Parser;
use keymatch::image::io::load_image;
use keymatch::{
    estimate_homography, estimate_pose, Border, BlobConfig, CornerConfig, CornerKind,
    DescriptorConfig, Estimate, ExtractConfig, Extractor, HistogridParams, HoughConfig,
    MatchConfig, OrientationConfig, PyramidConfig, RansacConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "KeyMatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BorderConfig {
    Constant,
    Replicate,
    Reflect,
    Wrap,
}

impl From<BorderConfig> for Border {
    fn from(value: BorderConfig) -> Self {
        match value {
            BorderConfig::Constant => Border::Constant,
            BorderConfig::Replicate => Border::Replicate,
            BorderConfig::Reflect => Border::Reflect,
            BorderConfig::Wrap => Border::Wrap,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MethodConfig {
    Homography,
    Hough,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CornerKindConfig {
    Harris,
    ShiTomasi,
}

impl From<CornerKindConfig> for CornerKind {
    fn from(value: CornerKindConfig) -> Self {
        match value {
            CornerKindConfig::Harris => CornerKind::Harris,
            CornerKindConfig::ShiTomasi => CornerKind::ShiTomasi,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PyramidConfigJson {
    layers: usize,
    add_layers: usize,
    sigma_zero: f32,
    sigma_start: f32,
    min_size: usize,
}

impl Default for PyramidConfigJson {
    fn default() -> Self {
        let cfg = PyramidConfig::default();
        Self {
            layers: cfg.layers,
            add_layers: cfg.add_layers,
            sigma_zero: cfg.sigma_zero,
            sigma_start: cfg.sigma_start,
            min_size: cfg.min_size,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BlobConfigJson {
    threshold: f32,
    edge_ratio: f32,
    max_iterations: usize,
    epsilon: f32,
    border_margin: usize,
}

impl Default for BlobConfigJson {
    fn default() -> Self {
        let cfg = BlobConfig::default();
        Self {
            threshold: cfg.threshold,
            edge_ratio: cfg.edge_ratio,
            max_iterations: cfg.max_iterations,
            epsilon: cfg.epsilon,
            border_margin: cfg.border_margin,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CornerFilterJson {
    kind: CornerKindConfig,
    harris_k: f32,
    threshold: f32,
}

impl Default for CornerFilterJson {
    fn default() -> Self {
        let cfg = CornerConfig::default();
        Self {
            kind: CornerKindConfig::ShiTomasi,
            harris_k: cfg.harris_k,
            threshold: cfg.threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DescriptorConfigJson {
    histo_size: usize,
    histo_nums: usize,
    bins: usize,
    magnitude_sigma_c: f32,
    interpolate: bool,
    orientation_bins: usize,
    orientation_sigma_c: f32,
    peak_ratio: f32,
    max_peaks: usize,
    clip: f32,
}

impl Default for DescriptorConfigJson {
    fn default() -> Self {
        let cfg = DescriptorConfig::default();
        Self {
            histo_size: cfg.histogrid.histo_size,
            histo_nums: cfg.histogrid.histo_nums,
            bins: cfg.histogrid.bins,
            magnitude_sigma_c: cfg.histogrid.magnitude_sigma_c,
            interpolate: cfg.histogrid.interpolate,
            orientation_bins: cfg.orientation.bins,
            orientation_sigma_c: cfg.orientation.sigma_c,
            peak_ratio: cfg.orientation.peak_ratio,
            max_peaks: cfg.orientation.max_peaks,
            clip: cfg.clip,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MatchConfigJson {
    ratio: f32,
    exclude_same_keypoint: bool,
}

impl Default for MatchConfigJson {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            ratio: cfg.ratio,
            exclude_same_keypoint: cfg.exclude_same_keypoint,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RansacConfigJson {
    iterations: usize,
    threshold: f64,
    seed: u64,
}

impl Default for RansacConfigJson {
    fn default() -> Self {
        let cfg = RansacConfig::default();
        Self {
            iterations: cfg.iterations,
            threshold: cfg.threshold,
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HoughConfigJson {
    location_coeff: f64,
    orientation_bins: usize,
    scale_min: f64,
    scale_factor: f64,
    scale_bins: usize,
    min_votes: usize,
}

impl Default for HoughConfigJson {
    fn default() -> Self {
        let cfg = HoughConfig::default();
        Self {
            location_coeff: cfg.location_coeff,
            orientation_bins: cfg.orientation_bins,
            scale_min: cfg.scale_min,
            scale_factor: cfg.scale_factor,
            scale_bins: cfg.scale_bins,
            min_votes: cfg.min_votes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    scene_path: String,
    object_path: String,
    output_path: Option<String>,
    method: MethodConfig,
    min_confidence: f64,
    border: BorderConfig,
    pyramid: PyramidConfigJson,
    blob: BlobConfigJson,
    corner_filter: Option<CornerFilterJson>,
    descriptor: DescriptorConfigJson,
    #[serde(rename = "match")]
    match_cfg: MatchConfigJson,
    ransac: RansacConfigJson,
    hough: HoughConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scene_path: String::new(),
            object_path: String::new(),
            output_path: None,
            method: MethodConfig::Homography,
            min_confidence: 0.0,
            border: BorderConfig::Reflect,
            pyramid: PyramidConfigJson::default(),
            blob: BlobConfigJson::default(),
            corner_filter: None,
            descriptor: DescriptorConfigJson::default(),
            match_cfg: MatchConfigJson::default(),
            ransac: RansacConfigJson::default(),
            hough: HoughConfigJson::default(),
        }
    }
}

impl Config {
    fn extract_config(&self) -> ExtractConfig {
        let border = Border::from(self.border);
        let p = &self.pyramid;
        let b = &self.blob;
        let d = &self.descriptor;
        ExtractConfig {
            pyramid: PyramidConfig {
                layers: p.layers,
                add_layers: p.add_layers,
                sigma_zero: p.sigma_zero,
                sigma_start: p.sigma_start,
                min_size: p.min_size,
                border,
            },
            blob: BlobConfig {
                threshold: b.threshold,
                edge_ratio: b.edge_ratio,
                max_iterations: b.max_iterations,
                epsilon: b.epsilon,
                border_margin: b.border_margin,
                border,
            },
            corner_filter: self.corner_filter.as_ref().map(|c| CornerConfig {
                kind: c.kind.into(),
                harris_k: c.harris_k,
                threshold: c.threshold,
                border,
                ..CornerConfig::default()
            }),
            descriptor: DescriptorConfig {
                histogrid: HistogridParams {
                    histo_size: d.histo_size,
                    histo_nums: d.histo_nums,
                    bins: d.bins,
                    magnitude_sigma_c: d.magnitude_sigma_c,
                    interpolate: d.interpolate,
                },
                orientation: OrientationConfig {
                    bins: d.orientation_bins,
                    sigma_c: d.orientation_sigma_c,
                    peak_ratio: d.peak_ratio,
                    max_peaks: d.max_peaks,
                },
                clip: d.clip,
                border,
            },
        }
    }

    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            ratio: self.match_cfg.ratio,
            exclude_same_keypoint: self.match_cfg.exclude_same_keypoint,
        }
    }

    fn ransac_config(&self) -> RansacConfig {
        RansacConfig {
            iterations: self.ransac.iterations,
            threshold: self.ransac.threshold,
            seed: self.ransac.seed,
        }
    }

    fn hough_config(&self) -> HoughConfig {
        let h = &self.hough;
        HoughConfig {
            location_coeff: h.location_coeff,
            orientation_bins: h.orientation_bins,
            scale_min: h.scale_min,
            scale_factor: h.scale_factor,
            scale_bins: h.scale_bins,
            min_votes: h.min_votes,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    source_paths: Vec<String>,
    probability: f32,
    transform: Option<[[f64; 3]; 3]>,
}

impl Output {
    fn new<K>(config: &Config, estimate: Option<Estimate<K>>) -> Self {
        let source_paths = vec![config.object_path.clone(), config.scene_path.clone()];
        match estimate {
            Some(estimate) => Self {
                source_paths,
                probability: estimate.confidence as f32,
                transform: Some(estimate.hypothesis.transform.m),
            },
            None => Self {
                source_paths,
                probability: 0.0,
                transform: None,
            },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("keymatch=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.scene_path.is_empty() || config.object_path.is_empty() {
        return Err("scene_path and object_path must be set in the config".into());
    }

    let extractor = Extractor::new(config.extract_config())?;
    let scene_img = load_image(&config.scene_path)?;
    let object_img = load_image(&config.object_path)?;
    let scene = extractor.detect_and_compute(&scene_img)?;
    let object = extractor.detect_and_compute(&object_img)?;
    tracing::info!(
        scene = scene.len(),
        object = object.len(),
        "descriptors extracted"
    );

    let output = match config.method {
        MethodConfig::Homography => {
            let estimate = estimate_homography(
                &object,
                &scene,
                &config.match_config(),
                &config.ransac_config(),
                config.min_confidence,
            )?;
            Output::new(&config, estimate)
        }
        MethodConfig::Hough => {
            let estimate = estimate_pose(
                &object,
                &scene,
                object_img.dims(),
                scene_img.dims(),
                &config.match_config(),
                &config.hough_config(),
                config.min_confidence,
            )?;
            Output::new(&config, estimate)
        }
    };
    let json = serde_json::to_string_pretty(&output)?;

    match &config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
