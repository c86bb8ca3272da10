use clap::Parser;
use imgalign::image::io;
use imgalign::{
    downsample_for_pixel_size, format_transform, parse_transform, AffineTransform2D,
    AlignmentImage, AlignmentRequest, AlignmentType, Annotation, Classification, EccConfig,
    Estimator, ImageSource, InMemoryImage, PixelSize, Point2, Roi, TransformationType,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));
const EXAMPLE_ANNOTATIONS_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/annotations.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "imgalign CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Print an example annotation file and exit.
    #[arg(long)]
    print_example_annotations: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AlignmentTypeConfig {
    #[default]
    Intensity,
    AreaAnnotations,
    PointAnnotations,
}

impl From<AlignmentTypeConfig> for AlignmentType {
    fn from(value: AlignmentTypeConfig) -> Self {
        match value {
            AlignmentTypeConfig::Intensity => AlignmentType::Intensity,
            AlignmentTypeConfig::AreaAnnotations => AlignmentType::AreaAnnotations,
            AlignmentTypeConfig::PointAnnotations => AlignmentType::PointAnnotations,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransformationTypeConfig {
    #[default]
    Affine,
    Rigid,
}

impl From<TransformationTypeConfig> for TransformationType {
    fn from(value: TransformationTypeConfig) -> Self {
        match value {
            TransformationTypeConfig::Affine => TransformationType::Affine,
            TransformationTypeConfig::Rigid => TransformationType::Rigid,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EccConfigJson {
    max_iterations: usize,
    epsilon: f64,
    gauss_filter_size: usize,
    parallel: bool,
}

impl Default for EccConfigJson {
    fn default() -> Self {
        let cfg = EccConfig::default();
        Self {
            max_iterations: cfg.max_iterations,
            epsilon: cfg.epsilon,
            gauss_filter_size: cfg.gauss_filter_size,
            parallel: cfg.parallel,
        }
    }
}

impl From<EccConfigJson> for EccConfig {
    fn from(value: EccConfigJson) -> Self {
        EccConfig {
            max_iterations: value.max_iterations,
            epsilon: value.epsilon,
            gauss_filter_size: value.gauss_filter_size,
            parallel: value.parallel,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageConfig {
    image_path: String,
    annotations_path: Option<String>,
    /// Pixel width and height in micrometres.
    pixel_size_um: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    base: ImageConfig,
    to_align: ImageConfig,
    alignment: AlignmentTypeConfig,
    transformation: TransformationTypeConfig,
    downsample: f64,
    /// Overrides `downsample` from the base pixel size when set.
    requested_pixel_size_um: Option<f64>,
    /// Starting transform in the two-row text format.
    initial_transform: Option<String>,
    output_path: Option<String>,
    ecc: EccConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: ImageConfig::default(),
            to_align: ImageConfig::default(),
            alignment: AlignmentTypeConfig::default(),
            transformation: TransformationTypeConfig::default(),
            downsample: 1.0,
            requested_pixel_size_um: None,
            initial_transform: None,
            output_path: None,
            ecc: EccConfigJson::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RoiJson {
    Points {
        points: Vec<[f64; 2]>,
    },
    Line {
        start: [f64; 2],
        end: [f64; 2],
    },
    Polyline {
        points: Vec<[f64; 2]>,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Ellipse {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Polygon {
        points: Vec<[f64; 2]>,
    },
}

fn to_points(points: Vec<[f64; 2]>) -> Vec<Point2> {
    points.into_iter().map(|[x, y]| Point2::new(x, y)).collect()
}

impl From<RoiJson> for Roi {
    fn from(value: RoiJson) -> Self {
        match value {
            RoiJson::Points { points } => Roi::Points(to_points(points)),
            RoiJson::Line { start, end } => Roi::Line {
                start: Point2::new(start[0], start[1]),
                end: Point2::new(end[0], end[1]),
            },
            RoiJson::Polyline { points } => Roi::Polyline(to_points(points)),
            RoiJson::Rectangle {
                x,
                y,
                width,
                height,
            } => Roi::Rectangle {
                x,
                y,
                width,
                height,
            },
            RoiJson::Ellipse {
                x,
                y,
                width,
                height,
            } => Roi::Ellipse {
                x,
                y,
                width,
                height,
            },
            RoiJson::Polygon { points } => Roi::Polygon(to_points(points)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationJson {
    roi: RoiJson,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<AnnotationJson> for Annotation {
    fn from(value: AnnotationJson) -> Self {
        Annotation {
            roi: value.roi.into(),
            classification: value.classification.map(Classification::new),
            name: value.name,
        }
    }
}

fn load_annotations(path: Option<&str>) -> Result<Vec<Annotation>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = fs::read_to_string(path)?;
    let parsed: Vec<AnnotationJson> = serde_json::from_str(&text)?;
    Ok(parsed.into_iter().map(Annotation::from).collect())
}

fn load_source(image: &ImageConfig) -> Result<InMemoryImage, Box<dyn std::error::Error>> {
    let pixel_size = image.pixel_size_um.map(|[w, h]| PixelSize::new(w, h));
    Ok(io::load_source(Path::new(&image.image_path), pixel_size)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("imgalign=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }
    if cli.print_example_annotations {
        println!("{EXAMPLE_ANNOTATIONS_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.base.image_path.is_empty() || config.to_align.image_path.is_empty() {
        return Err("base.image_path and to_align.image_path must be set in the config".into());
    }

    let base = load_source(&config.base)?;
    let to_align = load_source(&config.to_align)?;
    let base_annotations = load_annotations(config.base.annotations_path.as_deref())?;
    let to_align_annotations = load_annotations(config.to_align.annotations_path.as_deref())?;

    let downsample = match config.requested_pixel_size_um {
        Some(requested) => downsample_for_pixel_size(requested, base.pixel_size())?,
        None => config.downsample,
    };
    let initial = match config.initial_transform.as_deref() {
        Some(text) => parse_transform(text)?,
        None => AffineTransform2D::identity(),
    };

    let request = AlignmentRequest::new(
        AlignmentImage::new(&base).with_annotations(&base_annotations),
        AlignmentImage::new(&to_align).with_annotations(&to_align_annotations),
        config.alignment.into(),
        config.transformation.into(),
    )
    .with_initial(initial)
    .with_downsample(downsample);

    tracing::info!(
        base = %config.base.image_path,
        to_align = %config.to_align.image_path,
        downsample,
        "estimating transform"
    );
    let estimator = Estimator::new().with_config(config.ecc.into());
    let transform = estimator.estimate(&request)?;
    let text = format_transform(&transform);

    match config.output_path {
        Some(path) => fs::write(path, format!("{text}\n"))?,
        None => println!("{text}"),
    }

    Ok(())
}
