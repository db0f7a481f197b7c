use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{error, info};

use prawdec_rs::dng_pipeline::asset::AssetOpener;
use prawdec_rs::dng_pipeline::dng::{DngFile, tags};
use prawdec_rs::dng_pipeline::metadata::Timecode;
use prawdec_rs::dng_pipeline::{
    BayerPattern, ConversionConfig, ConversionQueue, ConversionStatus, Converter, MovAssetOpener,
    SampleLayout,
};
use prawdec_rs::logger;

#[derive(Debug, Parser)]
#[command(
    name = "prawdec",
    version,
    about = "Convert ProRes RAW clips into CinemaDNG sequences"
)]
struct Cli {
    /// Show per-frame logging output.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert one or more clips into DNG sequences.
    Convert {
        /// Input clips (.mov).
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory. With several inputs each clip gets a
        /// subdirectory named after its file stem.
        #[arg(long)]
        out: PathBuf,
        /// DNG sample layout (packed, widened16).
        #[arg(long, default_value_t = SampleLayout::Packed)]
        layout: SampleLayout,
        /// CFA pattern of the sensor (rggb, bggr, grbg, gbrg).
        #[arg(long, default_value_t = BayerPattern::Rggb)]
        pattern: BayerPattern,
        /// Sensor bit depth to use instead of the container's.
        #[arg(long)]
        bits_per_sample: Option<u16>,
        /// Camera model used when the clip names none.
        #[arg(long)]
        camera_model: Option<String>,
        /// File name prefix (defaults to the input file stem).
        #[arg(long)]
        prefix: Option<String>,
        /// Minimum number of digits in the frame index.
        #[arg(long, default_value_t = 6)]
        index_width: usize,
        /// Largest accepted frame width or height.
        #[arg(long, default_value_t = 16_384)]
        max_dimension: u32,
        /// Fail instead of replacing existing DNG files.
        #[arg(long)]
        no_clobber: bool,
    },
    /// Print what the converter sees in a clip.
    Probe {
        input: PathBuf,
    },
    /// Dump the IFD0 tags of a DNG file.
    Inspect {
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(if cli.verbose { "debug" } else { "warn" });

    match cli.command {
        Commands::Convert {
            inputs,
            out,
            layout,
            pattern,
            bits_per_sample,
            camera_model,
            prefix,
            index_width,
            max_dimension,
            no_clobber,
        } => {
            let config = ConversionConfig::builder()
                .sample_layout(layout)
                .bayer_pattern(pattern)
                .assume_bits_per_sample(bits_per_sample)
                .camera_model(camera_model)
                .file_prefix(prefix)
                .index_width(index_width)
                .max_dimension(max_dimension)
                .overwrite(!no_clobber)
                .build();
            convert(config, &inputs, &out)
        }
        Commands::Probe { input } => probe(&input),
        Commands::Inspect { input } => inspect(&input),
    }
}

fn output_dir_for(input: &Path, out: &Path, several: bool) -> PathBuf {
    match input.file_stem() {
        Some(stem) if several => out.join(stem),
        _ => out.to_path_buf(),
    }
}

fn convert(config: ConversionConfig, inputs: &[PathBuf], out: &Path) -> anyhow::Result<()> {
    let queue = ConversionQueue::new(Converter::new(config));
    let mut names = HashMap::new();
    for input in inputs {
        let id = queue.add(input, output_dir_for(input, out, inputs.len() > 1));
        names.insert(id, input.display().to_string());
    }

    let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {percent:>3}% {msg}")?
        .progress_chars("##-");
    let multi = MultiProgress::new();
    let bars: Mutex<HashMap<u64, ProgressBar>> = Mutex::new(HashMap::new());

    let items = queue.run(move |item| {
        let Ok(mut bars) = bars.lock() else {
            return;
        };
        let bar = bars.entry(item.id).or_insert_with(|| {
            let bar = multi.add(ProgressBar::new(1_000));
            bar.set_style(style.clone());
            bar.set_message(item.input.display().to_string());
            bar
        });
        bar.set_position((item.progress * 1_000.0).round() as u64);
        match &item.status {
            ConversionStatus::Completed => bar.finish_with_message(format!("{} done", item.input.display())),
            ConversionStatus::Cancelled => bar.abandon_with_message(format!("{} cancelled", item.input.display())),
            ConversionStatus::Failed(reason) => bar.abandon_with_message(format!("{} failed: {}", item.input.display(), reason)),
            ConversionStatus::Pending | ConversionStatus::Converting => {}
        }
    });

    let mut failed = 0;
    for item in &items {
        let name = names.get(&item.id).map(String::as_str).unwrap_or("?");
        match &item.status {
            ConversionStatus::Completed => {
                info!(input = name, frames = item.frames_written, "Converted");
                println!("{}: {} frame(s) -> {}", name, item.frames_written, item.output_dir.display());
            }
            status => {
                failed += 1;
                error!(input = name, "{}", status);
                eprintln!("{}: {}", name, status);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} clip(s) did not convert", failed, items.len());
    }
    Ok(())
}

fn probe(input: &Path) -> anyhow::Result<()> {
    let reader = MovAssetOpener::new()
        .open(input)
        .with_context(|| format!("probing {}", input.display()))?;
    let info = reader.info();

    println!("file:        {}", input.display());
    println!("codec:       {}", info.codec);
    println!("dimensions:  {}x{}", info.width, info.height);
    match info.depth {
        Some(depth) => println!("depth:       {} bits", depth),
        None => println!("depth:       unknown"),
    }
    println!("frames:      {}", info.frame_count);
    if let Some(rate) = info.frame_rate() {
        println!("frame rate:  {}", rate);
    }
    println!("orientation: {:?}", info.orientation);
    if let Some(tc) = info.timecode
        && tc.frames_per_second > 0
    {
        let start = Timecode::from_frame_number(tc.start_frame, tc.frames_per_second, tc.drop_frame);
        println!("timecode:    {} @ {} fps", start, tc.frames_per_second);
    }
    for (key, value) in &info.metadata {
        println!("{}: {}", key, value);
    }
    Ok(())
}

fn inspect(input: &Path) -> anyhow::Result<()> {
    let dng = DngFile::read(input).with_context(|| format!("reading {}", input.display()))?;
    println!("{} ({:?})", input.display(), dng.byte_order());
    for (tag, value) in dng.tags() {
        let name = tags::tag_name(tag).unwrap_or("Unknown");
        println!("{:>6} {:<26} {}", tag, name, value);
    }
    Ok(())
}
