//! GreenTrend CLI - long-term NDVI/LST trends and zonal statistics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use greentrend_algorithms::trend::{raster_trend, TimeBasis};
use greentrend_algorithms::zonal::{
    zonal_snapshot, zonal_trends, BatchReport, SnapshotInputs, SnapshotParams, ZonalInputs,
    ZonalTrendParams,
};
use greentrend_core::io::{read_geotiff, read_geotiff_stack, write_geotiff_stack, GeoJsonLayer};
use greentrend_core::{require_file, Raster, RasterStack};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "greentrend")]
#[command(author, version, about = "Long-term trend and zonal statistics for NDVI and LST stacks", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for pixel-wise computation (default: all cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute a per-pixel linear trend raster from a yearly stack
    Trend {
        /// Input multi-band raster, one band per period
        input: PathBuf,
        /// First year of the stack
        start_year: i32,
        /// Last year of the stack (inclusive)
        end_year: i32,
        /// Years per band
        #[arg(short, long, default_value = "1")]
        step: u32,
        /// Output file (default: <input stem>LinearTrendStats.tif)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Zonal statistics written onto a vector layer
    Zonal {
        #[command(subcommand)]
        algorithm: ZonalCommands,
    },
}

// ─── Zonal subcommands ──────────────────────────────────────────────────

#[derive(Subcommand)]
enum ZonalCommands {
    /// Per-zone trend of the median NDVI and LST series, plus class areas
    Trends {
        /// Zones (GeoJSON FeatureCollection, updated in place)
        zones: PathBuf,
        /// NDVI stack, one band per period
        ndvi: PathBuf,
        /// LST stack, one band per period
        lst: PathBuf,
        /// Reference band for the medNDVI / medLST fields (1-based)
        band: usize,
        /// Land-cover classification raster (1 = green, 2 = water, 3 = urban)
        classes: PathBuf,
        /// Attribute identifying a zone
        #[arg(short, long, default_value = "zcta")]
        key_field: String,
        /// First year of the stacks
        #[arg(long, default_value = "1990")]
        start_year: i32,
        /// Last year of the stacks (inclusive)
        #[arg(long, default_value = "2019")]
        end_year: i32,
        /// Years per band
        #[arg(short, long, default_value = "1")]
        step: u32,
    },
    /// Per-zone medians of one band and of precomputed trend rasters
    Snapshot {
        /// Zones (GeoJSON FeatureCollection, updated in place)
        zones: PathBuf,
        /// NDVI trend raster
        ndvi_stats: PathBuf,
        /// LST trend raster
        lst_stats: PathBuf,
        /// NDVI stack
        ndvi: PathBuf,
        /// LST stack
        lst: PathBuf,
        /// Band reported in medianNDVI / medianLST (1-based)
        band: usize,
        /// Land-cover classification raster (1 = green, 2 = water, 3 = urban)
        classes: PathBuf,
        /// Attribute identifying a zone
        #[arg(short, long, default_value = "GEOID")]
        key_field: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")
}

fn set_threads(threads: Option<usize>) -> Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("Failed to configure thread pool")?;
        info!("Using {} threads", n);
    }
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_stack(path: &Path) -> Result<RasterStack> {
    let pb = spinner("Reading raster...");
    let stack = read_geotiff_stack(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    let (bands, rows, cols) = stack.shape();
    info!("Input: {} x {} x {} bands", cols, rows, bands);
    Ok(stack)
}

fn read_classes(path: &Path) -> Result<Raster<i32>> {
    let pb = spinner("Reading classification...");
    let raster: Raster<i32> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    Ok(raster)
}

fn open_zones(path: &Path) -> Result<GeoJsonLayer> {
    let layer = GeoJsonLayer::open(path)
        .with_context(|| format!("Failed to open zones {}", path.display()))?;
    Ok(layer)
}

/// Fail before any computation when an input is missing
fn require_inputs(paths: &[&Path]) -> Result<()> {
    for path in paths {
        require_file(path)?;
    }
    Ok(())
}

/// 1-based band argument to a 0-based index
fn band_index(band: usize) -> Result<usize> {
    band.checked_sub(1)
        .context("Band numbers start at 1")
}

fn default_trend_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}LinearTrendStats.tif", stem))
}

fn report(report: &BatchReport, path: &Path, elapsed: std::time::Duration) {
    println!("Zones updated in: {}", path.display());
    println!("  Written: {}", report.written);
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    {}: {}", skipped.key, skipped.reason);
        }
    }
    println!("  Processing time: {:.2?}", elapsed);
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run(cli: Cli) -> Result<()> {
    set_threads(cli.threads)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            require_file(&input)?;
            let stack = read_stack(&input)?;
            let (bands, rows, cols) = stack.shape();
            let gt = stack.transform();
            let bounds = gt.bounds(cols, rows);
            let cells = rows * cols;

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, cells);
            println!("Bands: {}", bands);
            println!("Cell size: {} x {}", gt.pixel_width, gt.pixel_height.abs());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            for b in 0..bands {
                let valid = stack.valid_count(b)?;
                print!("Band {}", b + 1);
                if let Some(desc) = stack.description(b) {
                    print!(" [{}]", desc);
                }
                if let Some(nodata) = stack.nodata(b) {
                    print!(" NoData: {}", nodata);
                }
                println!(
                    " Valid cells: {} ({:.1}%)",
                    valid,
                    100.0 * valid as f64 / cells.max(1) as f64
                );
            }
        }

        // ── Trend raster ─────────────────────────────────────────────
        Commands::Trend {
            input,
            start_year,
            end_year,
            step,
            output,
        } => {
            require_file(&input)?;
            let basis = TimeBasis::new(start_year, end_year, step)?;
            let stack = read_stack(&input)?;
            let output = output.unwrap_or_else(|| default_trend_output(&input));

            let start = Instant::now();
            let pb = spinner("Computing trend statistics...");
            let trend = raster_trend(&stack, &basis).context("Trend computation failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...");
            write_geotiff_stack(&trend, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            pb.finish_and_clear();
            done("Trend statistics", &output, elapsed);
        }

        // ── Zonal ────────────────────────────────────────────────────
        Commands::Zonal { algorithm } => match algorithm {
            ZonalCommands::Trends {
                zones,
                ndvi,
                lst,
                band,
                classes,
                key_field,
                start_year,
                end_year,
                step,
            } => {
                require_inputs(&[zones.as_path(), ndvi.as_path(), lst.as_path(), classes.as_path()])?;
                let params = ZonalTrendParams {
                    key_field,
                    start_year,
                    end_year,
                    step,
                    reference_band: band_index(band)?,
                };

                let ndvi = read_stack(&ndvi)?;
                let lst = read_stack(&lst)?;
                let classes = read_classes(&classes)?;
                let mut layer = open_zones(&zones)?;
                let inputs = ZonalInputs {
                    ndvi: &ndvi,
                    lst: &lst,
                    classes: &classes,
                };

                let start = Instant::now();
                let pb = spinner("Computing zonal trends...");
                let batch = zonal_trends(&mut layer, &inputs, &params)
                    .context("Zonal trend batch failed")?;
                pb.finish_and_clear();
                report(&batch, &zones, start.elapsed());
            }
            ZonalCommands::Snapshot {
                zones,
                ndvi_stats,
                lst_stats,
                ndvi,
                lst,
                band,
                classes,
                key_field,
            } => {
                require_inputs(&[
                    zones.as_path(),
                    ndvi_stats.as_path(),
                    lst_stats.as_path(),
                    ndvi.as_path(),
                    lst.as_path(),
                    classes.as_path(),
                ])?;
                let params = SnapshotParams {
                    key_field,
                    band: band_index(band)?,
                };

                let ndvi_trend = read_stack(&ndvi_stats)?;
                let lst_trend = read_stack(&lst_stats)?;
                let ndvi = read_stack(&ndvi)?;
                let lst = read_stack(&lst)?;
                let classes = read_classes(&classes)?;
                let mut layer = open_zones(&zones)?;
                let inputs = SnapshotInputs {
                    zonal: ZonalInputs {
                        ndvi: &ndvi,
                        lst: &lst,
                        classes: &classes,
                    },
                    ndvi_trend: &ndvi_trend,
                    lst_trend: &lst_trend,
                };

                let start = Instant::now();
                let pb = spinner("Computing zonal snapshot...");
                let batch = zonal_snapshot(&mut layer, &inputs, &params)
                    .context("Zonal snapshot batch failed")?;
                pb.finish_and_clear();
                report(&batch, &zones, start.elapsed());
            }
        },
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("{:#}", e);
    }

    // Failures are reported, not signalled through the exit status.
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
    }
}
