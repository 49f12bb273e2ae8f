use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use webp_validator::{
    BitstreamFormat, LoopCount, ValidateOptions, WebpInfo, validate_file,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Maximum accepted canvas width
    #[arg(long, default_value = "16384", global = true)]
    max_width: u32,

    /// Maximum accepted canvas height
    #[arg(long, default_value = "16384", global = true)]
    max_height: u32,

    /// Maximum accepted number of animation frames
    #[arg(long, global = true)]
    max_frames: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one or more files and print a verdict per file
    Validate {
        /// WebP files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Display information about a WebP file
    Info {
        /// WebP file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = ValidateOptions {
        max_width: cli.max_width,
        max_height: cli.max_height,
        max_frames: cli.max_frames,
    };

    match cli.command {
        Commands::Validate { files } => Ok(validate_command(&files, &options)),
        Commands::Info { input } => info_command(input, &options),
    }
}

// RUST_LOG takes precedence over -v.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn validate_command(files: &[PathBuf], options: &ValidateOptions) -> ExitCode {
    let mut failures = 0;

    for path in files {
        match validate_file(path, options) {
            Ok(info) => println!("{}: OK {}", path.display(), summary(&info)),
            Err(e) => {
                failures += 1;
                println!("{}: INVALID ({:?}) {}", path.display(), e.kind(), e);
            }
        }
    }

    if failures > 0 {
        tracing::info!(failures, total = files.len(), "some files failed validation");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn info_command(
    input: PathBuf,
    options: &ValidateOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let info = validate_file(&input, options)?;
    let file_size = std::fs::metadata(&input)?.len();

    println!("WebP File: {}", input.display());
    println!("Dimensions: {}x{}", info.width, info.height);
    println!("Format: {}", format_name(info.format));
    println!("File Size: {}", format_bytes(file_size));
    println!("Has Alpha: {}", yes_no(info.has_alpha));

    if info.format == BitstreamFormat::Extended {
        println!("Has ICC Profile: {}", yes_no(info.features.icc_profile));
        println!("Has EXIF Data: {}", yes_no(info.features.exif));
        println!("Has XMP Data: {}", yes_no(info.features.xmp));
    }

    if info.is_animated {
        println!("Frames: {}", info.num_frames);
        if let Some(loop_count) = info.loop_count {
            match loop_count {
                LoopCount::Forever => println!("Loop Count: infinite"),
                LoopCount::Times(n) => println!("Loop Count: {n}"),
            }
        }
        if let Some([b, g, r, a]) = info.background_color {
            println!("Background: #{r:02x}{g:02x}{b:02x}{a:02x}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn summary(info: &WebpInfo) -> String {
    let mut out = format!("{}x{} {}", info.width, info.height, format_name(info.format));
    if info.has_alpha {
        out.push_str(", alpha");
    }
    if info.is_animated {
        out.push_str(&format!(", {} frames", info.num_frames));
    }
    out
}

fn format_name(format: BitstreamFormat) -> &'static str {
    match format {
        BitstreamFormat::Lossy => "lossy (VP8)",
        BitstreamFormat::Lossless => "lossless (VP8L)",
        BitstreamFormat::Extended => "extended (VP8X)",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

// Helper function to format byte sizes in a human-readable way
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
