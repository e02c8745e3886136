//! voxmeta CLI - Voxelwise and region-wise meta-analysis

mod manifest;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use manifest::Manifest;
use voxmeta_analysis::{
    Centers, EffectSizeMethod, Label, MetaChannel, MetaParams, ModelKind, TableOutput,
    region_meta_analysis, table_meta_analysis, voxelwise_meta_analysis,
};
use voxmeta_core::io::{load_volume, read_study_table, read_volume, write_volume};
use voxmeta_core::{Mask, Reduction, Volume};
use voxmeta_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "voxmeta")]
#[command(author, version, long_about = None)]
#[command(about = "Voxelwise meta-analysis of multi-center studies")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a volume file
    Info {
        /// Input volume file
        input: PathBuf,
    },
    /// Pool a CSV table of per-center summary statistics
    Table {
        /// CSV with columns center,mean1,std1,count1,mean2,std2,count2
        input: PathBuf,
        /// Pooling model: fixed, random
        #[arg(short, long, default_value = "random")]
        model: String,
        /// Effect size method: cohen_d, hedge_g
        #[arg(short = 'e', long, default_value = "cohen_d")]
        method: String,
        /// Print per-study rows (forest plot data)
        #[arg(short, long)]
        forest: bool,
    },
    /// Pool every voxel of a multi-center volumetric dataset
    Voxelwise {
        /// JSON manifest: center -> label -> volume files
        manifest: PathBuf,
        /// Output prefix; writes <prefix>_<channel>.tif
        output: PathBuf,
        /// Experimental group label
        #[arg(short = 'x', long)]
        experimental: String,
        /// Control group label
        #[arg(short, long)]
        control: String,
        /// Mask volume; non-zero voxels are pooled
        #[arg(long)]
        mask: Option<PathBuf>,
        /// Binarize the mask at this value (for probability maps)
        #[arg(long)]
        mask_threshold: Option<f64>,
        /// Pooling model: fixed, random
        #[arg(short, long, default_value = "random")]
        model: String,
        /// Effect size method: cohen_d, hedge_g
        #[arg(short = 'e', long, default_value = "cohen_d")]
        method: String,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short, long, default_value = "0")]
        threads: usize,
        /// Voxels per work unit
        #[arg(long, default_value = "4096")]
        chunk_size: usize,
    },
    /// Pool every labeled region of a region mask
    Region {
        /// JSON manifest: center -> label -> volume files
        manifest: PathBuf,
        /// Output CSV, one row per region
        output: PathBuf,
        /// Experimental group label
        #[arg(short = 'x', long)]
        experimental: String,
        /// Control group label
        #[arg(short, long)]
        control: String,
        /// Integer-labeled region mask volume
        #[arg(long)]
        mask: PathBuf,
        /// Per-region reduction: mean, sum
        #[arg(short, long, default_value = "mean")]
        reduction: String,
        /// Pooling model: fixed, random
        #[arg(short, long, default_value = "random")]
        model: String,
        /// Effect size method: cohen_d, hedge_g
        #[arg(short = 'e', long, default_value = "cohen_d")]
        method: String,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short, long, default_value = "0")]
        threads: usize,
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
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn params(model: &str, method: &str, threads: usize) -> Result<MetaParams> {
    Ok(MetaParams {
        model: model.parse::<ModelKind>()?,
        method: method.parse::<EffectSizeMethod>()?,
        mode: ProcessingMode::from_threads(threads),
        ..Default::default()
    })
}

fn load_centers(manifest: &Manifest) -> Result<Centers> {
    let pb = spinner("Reading volumes...");
    let centers =
        Centers::from_sources(&manifest.sources()).context("Failed to build centers")?;
    pb.finish_and_clear();
    info!(
        "Input: {} centers, {} volumes",
        centers.len(),
        manifest.file_count()
    );
    Ok(centers)
}

fn read_mask(path: &Path, threshold: Option<f64>) -> Result<Mask> {
    let volume = load_volume(path).context("Failed to read mask")?;
    let mask = Mask::from_volume(&volume);
    let mask = match threshold {
        Some(t) => mask.binarize(t),
        None => mask,
    };
    info!("Mask: {} of {} voxels selected", mask.selected_count(), volume.len());
    Ok(mask)
}

fn channel_path(prefix: &Path, channel: MetaChannel) -> PathBuf {
    PathBuf::from(format!("{}_{}.tif", prefix.display(), channel.name()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    info!("{} saved to: {} ({:.2?})", name, path.display(), elapsed);
}

fn print_table(output: &TableOutput, forest: bool) {
    let model = &output.model;
    let r = model.result();

    if forest {
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "study", "effect", "variance", "lower", "upper", "weight%"
        );
        for row in &output.forest {
            println!(
                "{:<20} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>8.2}",
                row.name, row.effect_size, row.variance, row.lower, row.upper, row.weight_percent
            );
        }
        println!();
    }

    println!("Model: {} ({} studies)", model.kind(), model.len());
    if model.kind() == ModelKind::Random {
        println!("  Tau^2: {:.6}", model.tau_squared());
    }
    println!("  Effect size: {:.6}", r.effect_size);
    println!("  Variance: {:.6}", r.variance);
    println!("  Standard error: {:.6}", r.standard_error);
    println!("  95% CI: [{:.6}, {:.6}]", r.lower_limit, r.upper_limit);
    println!("  Heterogeneity (Q): {:.6}", r.heterogeneity);
    println!("  z: {:.6}", r.z);
    println!("  p: {:.6e}", r.p);
}

#[derive(Serialize)]
struct RegionRow {
    region: i64,
    studies: usize,
    effect_size: Option<f64>,
    variance: Option<f64>,
    standard_error: Option<f64>,
    lower_limit: Option<f64>,
    upper_limit: Option<f64>,
    heterogeneity: Option<f64>,
    z: Option<f64>,
    p: Option<f64>,
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading volume...");
            let volume: Volume<f64> = read_volume(&input).context("Failed to read volume")?;
            pb.finish_and_clear();
            let stats = volume.statistics();
            let t = volume.transform();

            println!("File: {}", input.display());
            println!("Shape: {:?} ({} voxels)", volume.shape(), volume.len());
            println!(
                "Spacing: ({:.4}, {:.4}, {:.4})",
                t.spacing[0], t.spacing[1], t.spacing[2]
            );
            println!(
                "Origin: ({:.4}, {:.4}, {:.4})",
                t.origin[0], t.origin[1], t.origin[2]
            );
            let last: Option<Vec<usize>> =
                volume.shape().iter().map(|n| n.checked_sub(1)).collect();
            if let Some(last) = last {
                let lo = t.voxel_to_world(&[0; 3]);
                let hi = t.voxel_to_world(&last);
                println!(
                    "Voxel centers: ({:.4}, {:.4}, {:.4}) - ({:.4}, {:.4}, {:.4})",
                    lo[0], lo[1], lo[2], hi[0], hi[1], hi[2]
                );
            }
            println!("Voxel volume: {:.4}", t.voxel_volume(volume.ndim()));
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid voxels: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / volume.len().max(1) as f64
            );
            println!("  NaN voxels: {}", stats.nan_count);
            println!("  Non-zero voxels: {}", stats.nonzero_count);
        }

        // ── Table ────────────────────────────────────────────────────
        Commands::Table {
            input,
            model,
            method,
            forest,
        } => {
            let params = params(&model, &method, 1)?;
            let records = read_study_table(&input).context("Failed to read study table")?;
            info!("Input: {} studies", records.len());
            let output = table_meta_analysis(&records, params).context("Meta-analysis failed")?;
            print_table(&output, forest);
        }

        // ── Voxelwise ────────────────────────────────────────────────
        Commands::Voxelwise {
            manifest,
            output,
            experimental,
            control,
            mask,
            mask_threshold,
            model,
            method,
            threads,
            chunk_size,
        } => {
            let params = MetaParams {
                chunk_size,
                ..params(&model, &method, threads)?
            };
            let manifest = Manifest::load(&manifest)?;
            let Some(template_path) = manifest.first_path() else {
                bail!("Manifest lists no volumes");
            };
            let template: Volume<f64> =
                read_volume(template_path).context("Failed to read template volume")?;

            let centers = load_centers(&manifest)?;
            let mask = mask.map(|m| read_mask(&m, mask_threshold)).transpose()?;

            let start = Instant::now();
            let pb = spinner("Computing voxelwise meta-analysis...");
            let result = voxelwise_meta_analysis(
                &centers,
                &Label::from(experimental),
                &Label::from(control),
                mask.as_ref(),
                params,
            )
            .context("Meta-analysis failed")?;
            pb.finish_and_clear();
            info!(
                "Pooled {} voxels ({} degenerate) in {:.2?}",
                result.selected,
                result.degenerate,
                start.elapsed()
            );

            let pb = spinner("Writing output...");
            for channel in MetaChannel::ALL {
                let path = channel_path(&output, channel);
                let volume = template.with_data(result.channel(channel).to_owned());
                write_volume(&volume, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            pb.finish_and_clear();
            done("Voxelwise results", &output, start.elapsed());
        }

        // ── Region ───────────────────────────────────────────────────
        Commands::Region {
            manifest,
            output,
            experimental,
            control,
            mask,
            reduction,
            model,
            method,
            threads,
        } => {
            let params = params(&model, &method, threads)?;
            let reduction: Reduction = reduction.parse()?;
            let manifest = Manifest::load(&manifest)?;
            let centers = load_centers(&manifest)?;
            let mask = read_mask(&mask, None)?;

            let start = Instant::now();
            let pb = spinner("Computing region meta-analysis...");
            let results = region_meta_analysis(
                &centers,
                &Label::from(experimental),
                &Label::from(control),
                &mask,
                reduction,
                params,
            )
            .context("Meta-analysis failed")?;
            pb.finish_and_clear();

            let mut writer = csv::Writer::from_path(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            for r in &results {
                let m = r.result;
                writer.serialize(RegionRow {
                    region: r.region,
                    studies: r.studies,
                    effect_size: m.map(|m| m.effect_size),
                    variance: m.map(|m| m.variance),
                    standard_error: m.map(|m| m.standard_error),
                    lower_limit: m.map(|m| m.lower_limit),
                    upper_limit: m.map(|m| m.upper_limit),
                    heterogeneity: m.map(|m| m.heterogeneity),
                    z: m.map(|m| m.z),
                    p: m.map(|m| m.p),
                })?;
            }
            writer.flush()?;
            done("Region results", &output, start.elapsed());
        }
    }

    Ok(())
}
