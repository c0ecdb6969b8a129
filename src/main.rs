//! Seat Capture - calibrate seat regions and crop table screenshots

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use egui::{Pos2, Rect};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use seat_capture::calibration::REGION_COUNT;
use seat_capture::capture::CapturedFrame;
use seat_capture::config::{self, AppConfig};
use seat_capture::routing::{seat_for_index, GridId, TABLE_COUNT};
use seat_capture::shared::PipelineContext;
use seat_capture::storage;

/// Seat Capture - recognize seat names from table screenshots
#[derive(Parser, Debug)]
#[command(name = "seat-capture")]
#[command(about = "Calibrate seat regions and crop table screenshots")]
struct Args {
    /// Config file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored calibration
    Show,

    /// Draw the seat regions on a reference screenshot and save them
    Calibrate {
        /// Reference screenshot
        #[arg(long)]
        reference: PathBuf,

        /// Region in display coordinates as x,y,w,h, once per seat in seat order
        #[arg(long = "rect", value_parser = parse_rect)]
        rects: Vec<Rect>,
    },

    /// Crop a screenshot with the stored calibration
    Crop {
        /// Screenshot to crop
        #[arg(long)]
        image: PathBuf,

        /// Directory the crops are written to
        #[arg(long)]
        out: PathBuf,

        /// Table the screenshot belongs to (1-based)
        #[arg(long, default_value = "1")]
        table: usize,
    },
}

fn parse_rect(value: &str) -> Result<Rect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in {:?}: {}", value, e))?;

    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(Rect::from_min_size(
            Pos2::new(*x, *y),
            egui::vec2(*w, *h),
        )),
        [_, _, _, _] => Err(format!("width and height must be positive in {:?}", value)),
        _ => Err(format!("expected x,y,w,h, got {:?}", value)),
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let context = PipelineContext::open(config)?;

    match args.command {
        Command::Show => show(&context),
        Command::Calibrate { reference, rects } => calibrate(&context, &reference, &rects),
        Command::Crop { image, out, table } => crop(&context, &image, &out, table),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => storage::get_config_dir()?.join("config.toml"),
    };
    config::load_or_default(&path)
}

fn show(context: &PipelineContext) -> Result<()> {
    let Some(calibration) = context.calibration() else {
        println!("No calibration stored at {:?}", context.store().path());
        return Ok(());
    };

    println!(
        "Calibration at {:?} ({}x{} reference)",
        context.store().path(),
        calibration.reference_width(),
        calibration.reference_height()
    );
    for (index, region) in calibration.regions().iter().enumerate() {
        let seat = seat_for_index(index)
            .map(|position| position.to_string())
            .unwrap_or_default();
        println!(
            "  [{}] x={} y={} w={} h={}  -> {}",
            index + 1,
            region.x,
            region.y,
            region.width,
            region.height,
            seat
        );
    }
    Ok(())
}

fn calibrate(context: &PipelineContext, reference: &Path, rects: &[Rect]) -> Result<()> {
    let image = image::open(reference)
        .with_context(|| format!("Failed to open reference {:?}", reference))?
        .to_rgba8();

    let mut editor = context.editor();
    editor.load_reference(image);
    if let Some(size) = editor.display_size() {
        info!(
            "Reference displayed at {}x{} (scale {:.3})",
            size.x,
            size.y,
            editor.scale()
        );
    }

    for rect in rects {
        editor.pointer_down(rect.min);
        editor.pointer_move(rect.max);
        match editor.pointer_up(rect.max) {
            Some(index) => info!("Region {} drawn", index + 1),
            None => warn!("Rectangle {:?} was discarded", rect),
        }
    }

    let Some(calibration) = context.accept_calibration(&mut editor)? else {
        bail!(
            "{} of {} regions drawn, calibration not saved",
            editor.drawn_count(),
            REGION_COUNT
        );
    };

    println!(
        "Saved {} regions for a {}x{} reference to {:?}",
        calibration.regions().len(),
        calibration.reference_width(),
        calibration.reference_height(),
        context.store().path()
    );
    Ok(())
}

fn crop(context: &PipelineContext, image: &Path, out: &Path, table: usize) -> Result<()> {
    if table == 0 || table > TABLE_COUNT {
        bail!("table must be between 1 and {}", TABLE_COUNT);
    }

    let frame = CapturedFrame::open(image)
        .with_context(|| format!("Failed to open screenshot {:?}", image))?;
    let outcome = context.capture(GridId(table - 1), frame)?;

    if let Some(mismatch) = outcome.mismatch {
        warn!("{}", mismatch);
    }

    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory {:?}", out))?;

    let mut written = 0;
    for (index, crop) in outcome.capture.crops().iter().enumerate() {
        let Some(crop) = crop else {
            warn!("Region {} is outside the screenshot", index + 1);
            continue;
        };
        let path = out.join(format!("region_{}.png", index + 1));
        crop.save(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        written += 1;
    }

    println!("Wrote {} of {} crops to {:?}", written, REGION_COUNT, out);
    Ok(())
}
