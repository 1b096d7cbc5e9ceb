//! aruco-measure CLI: measure objects next to an ArUco marker, print markers.

use aruco_measure::marker::{builtins, render_marker, DEFAULT_DICTIONARY};
use aruco_measure::{Annotator, MarkerSelection, MeasureConfig, MeasureOutcome, ObjectMeasurer};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "aruco-measure")]
#[command(about = "Measure objects in a photo using a printed ArUco marker (DICT_6X6_250) as scale")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the objects in an image.
    Measure(MeasureArgs),

    /// Render a printable marker from the default dictionary.
    Marker(MarkerArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SelectionArg {
    First,
    Largest,
    RejectAmbiguous,
}

impl From<SelectionArg> for MarkerSelection {
    fn from(v: SelectionArg) -> Self {
        match v {
            SelectionArg::First => MarkerSelection::First,
            SelectionArg::Largest => MarkerSelection::Largest,
            SelectionArg::RejectAmbiguous => MarkerSelection::RejectAmbiguous,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(v: LogLevelArg) -> Self {
        match v {
            LogLevelArg::Off => LevelFilter::Off,
            LogLevelArg::Error => LevelFilter::Error,
            LogLevelArg::Warn => LevelFilter::Warn,
            LogLevelArg::Info => LevelFilter::Info,
            LogLevelArg::Debug => LevelFilter::Debug,
            LogLevelArg::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct MeasureArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Printed marker side length in meters [default: 0.10].
    #[arg(long)]
    marker_size: Option<f64>,

    /// Minimum object contour area in pixels [default: 500].
    #[arg(long)]
    min_area: Option<f64>,

    /// Which marker sets the scale when several are visible [default: largest].
    #[arg(long, value_enum)]
    selection: Option<SelectionArg>,

    /// Also measure the marker itself.
    #[arg(long)]
    keep_markers: bool,

    /// Where to write the annotated image [default: static/object_measurements.jpg].
    #[arg(long)]
    annotated_out: Option<PathBuf>,

    /// Do not write an annotated image.
    #[arg(long, conflicts_with = "annotated_out")]
    no_annotate: bool,

    /// TrueType font for labels in the annotated image.
    #[arg(long)]
    font: Option<PathBuf>,

    /// JSON config file; command-line flags take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,

    /// Log verbosity on stderr.
    #[arg(long, value_enum, default_value_t = LogLevelArg::Info)]
    log_level: LogLevelArg,
}

#[derive(Debug, Clone, Args)]
struct MarkerArgs {
    /// Marker id in DICT_6X6_250.
    #[arg(long)]
    id: u32,

    /// Marker side length in pixels, border included.
    #[arg(long, default_value_t = 400)]
    side_px: u32,

    /// White margin around the marker, in pixels.
    #[arg(long, default_value_t = 40)]
    quiet_zone_px: u32,

    /// Output image path (format from extension).
    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Measure(args) => run_measure(&args),
        Commands::Marker(args) => run_marker(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: LevelFilter) {
    #[cfg(feature = "tracing")]
    {
        let _ = level;
        aruco_measure::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = aruco_measure::core::init_with_level(level);
    }
}

fn run_measure(args: &MeasureArgs) -> CliResult<()> {
    init_logging(args.log_level.into());

    let config = match &args.config {
        Some(path) => MeasureConfig::load_json(path)?,
        None => MeasureConfig::default(),
    };

    let mut params = config.measure_params();
    if let Some(v) = args.marker_size {
        params.marker_size_m = v;
    }
    if let Some(v) = args.min_area {
        params.min_object_area_px = v;
    }
    if let Some(v) = args.selection {
        params.marker_selection = v.into();
    }
    if args.keep_markers {
        params.exclude_markers = false;
    }

    let measurer = ObjectMeasurer::new(params)?;

    let mut annotator = Annotator::new(config.style.clone());
    let font = args
        .font
        .clone()
        .or_else(|| config.font_path.as_ref().map(PathBuf::from));
    if let Some(font) = font {
        annotator = annotator.with_font_file(font)?;
    }

    let out_path = if args.no_annotate {
        None
    } else {
        Some(
            args.annotated_out
                .clone()
                .unwrap_or_else(|| PathBuf::from(config.annotated_path())),
        )
    };

    log::info!("measuring {}", args.image.display());
    let report = measurer.measure_and_annotate(&args.image, &annotator, out_path.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report.outcome {
        MeasureOutcome::NoMarkerDetected => println!("no markers detected"),
        MeasureOutcome::AmbiguousMarkers { markers } => {
            println!("{} markers detected, none selected", markers.len())
        }
        MeasureOutcome::Measured { measurements, .. } => {
            for m in measurements {
                println!("{}", m.label());
            }
        }
    }
    Ok(())
}

fn run_marker(args: &MarkerArgs) -> CliResult<()> {
    let dict = builtins::builtin_dictionary(DEFAULT_DICTIONARY)
        .ok_or_else(|| format!("dictionary {DEFAULT_DICTIONARY} is not available"))?;
    let img = render_marker(&dict, args.id, args.side_px, args.quiet_zone_px).ok_or_else(|| {
        format!(
            "cannot render marker {} ({} ids, side must be at least {} px)",
            args.id,
            dict.codes.len(),
            dict.marker_size + 2
        )
    })?;
    if let Some(dir) = args.out.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    img.save(&args.out)?;
    println!("wrote marker {} to {}", args.id, args.out.display());
    Ok(())
}
