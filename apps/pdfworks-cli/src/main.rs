//! pdfworks command-line front end
//!
//! Every document operation is turned into a [`PdfCommand`] and run through
//! the engine; `run` executes a command given as JSON.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::AppConfig;
use pdfworks_core::command::CommandOutput;
use pdfworks_core::compress::DocumentStats;
use pdfworks_core::document::load_document;
use pdfworks_core::metadata::read_metadata;
use pdfworks_core::stamp::StampPosition;
use pdfworks_core::watermark::{WatermarkPreset, WatermarkStyle};
use pdfworks_core::*;
use pdfworks_services::{AiClient, ConversionRequest, DocumentConverter, OfficeConverter, TargetFormat};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfworks")]
#[command(version, about = "Merge, split, stamp, compress and convert PDF documents")]
struct Args {
    /// Configuration file (defaults to ./pdfworks.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Algorithm {
    Aes128,
    Rc4,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate documents in the given order
    Merge {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// One document per range, written as <stem>-<n>.pdf
    Split {
        input: PathBuf,
        /// Inclusive ranges, e.g. "1-3, 4-4, 5-9"
        #[arg(long)]
        ranges: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Copy the listed pages into a new document
    Extract {
        input: PathBuf,
        #[arg(long)]
        pages: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Put pages in a new order, e.g. "3,1,2"
    Reorder {
        input: PathBuf,
        #[arg(long)]
        order: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove pages
    Delete {
        input: PathBuf,
        #[arg(long)]
        pages: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    Rotate {
        input: PathBuf,
        /// 90, 180 or 270, added to the existing rotation
        #[arg(long)]
        angle: i64,
        /// all, odd, even or a range list
        #[arg(long, default_value = "all")]
        pages: PageSelection,
        #[arg(short, long)]
        output: PathBuf,
    },
    Crop {
        input: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        top: f64,
        #[arg(long, default_value_t = 0.0)]
        right: f64,
        #[arg(long, default_value_t = 0.0)]
        bottom: f64,
        #[arg(long, default_value_t = 0.0)]
        left: f64,
        /// pt, in, cm or mm
        #[arg(long, default_value = "pt")]
        unit: MarginUnit,
        #[arg(long, default_value = "all")]
        pages: PageSelection,
        #[arg(short, long)]
        output: PathBuf,
    },
    Watermark {
        input: PathBuf,
        #[arg(long)]
        text: Option<String>,
        /// PNG, JPEG or PDF; used only without --text
        #[arg(long)]
        image: Option<PathBuf>,
        /// confidential, draft, sample, copy, approved, do-not-copy
        #[arg(long)]
        preset: Option<WatermarkPreset>,
        #[arg(long)]
        opacity: Option<f64>,
        #[arg(long)]
        rotation: Option<f64>,
        #[arg(long)]
        font_size: Option<f64>,
        #[arg(long)]
        color: Option<String>,
        /// Top-left placement as "nx,ny"; centered when absent
        #[arg(long)]
        position: Option<String>,
        #[arg(long, default_value = "all")]
        pages: PageSelection,
        #[arg(short, long)]
        output: PathBuf,
    },
    PageNumbers {
        input: PathBuf,
        /// Template with {page}, {total} and {date}
        #[arg(long, default_value = "{page}")]
        format: String,
        /// e.g. bottom-center, top-right
        #[arg(long, default_value = "bottom-center")]
        position: StampPosition,
        #[arg(long, default_value_t = 1)]
        start: u32,
        #[arg(long, default_value = "all")]
        pages: PageSelection,
        #[arg(short, long)]
        output: PathBuf,
    },
    HeaderFooter {
        input: PathBuf,
        #[arg(long)]
        header: Option<String>,
        #[arg(long)]
        footer: Option<String>,
        #[arg(long, default_value = "all")]
        pages: PageSelection,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Replace every page with an image of itself
    Flatten {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Apply annotations listed in a JSON file
    Annotate {
        input: PathBuf,
        #[arg(long)]
        annotations: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    Sign {
        input: PathBuf,
        /// PNG or JPEG signature image
        #[arg(long, conflicts_with = "text")]
        image: Option<PathBuf>,
        /// Typed signature
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Top-left placement as "nx,ny"
        #[arg(long)]
        position: Option<String>,
        /// Width in points
        #[arg(long)]
        width: Option<f64>,
        #[arg(short, long)]
        output: PathBuf,
    },
    Compress {
        input: PathBuf,
        /// low, medium, high, extreme or smart
        #[arg(long, default_value = "medium")]
        level: CompressionLevel,
        #[arg(short, long)]
        output: PathBuf,
    },
    Unlock {
        input: PathBuf,
        #[arg(long, env = "PDFWORKS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    Protect {
        input: PathBuf,
        #[arg(long)]
        user_password: String,
        #[arg(long)]
        owner_password: Option<String>,
        #[arg(long, value_enum, default_value = "aes128")]
        algorithm: Algorithm,
        /// Deny printing, copying and editing
        #[arg(long)]
        restrict: bool,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Side-by-side comparison of two revisions
    Compare {
        left: PathBuf,
        right: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print metadata, or update it when any field is given
    Metadata {
        input: PathBuf,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        /// Required when updating
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Page count, sizes, encryption and metadata as JSON
    Info { input: PathBuf },
    /// Convert between PDF and office formats with the external converter
    Convert {
        input: PathBuf,
        /// pdf, docx, xlsx or pptx
        #[arg(long)]
        to: TargetFormat,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Execute a JSON-serialised command
    Run {
        command: PathBuf,
        /// Output file, or directory for multi-document results
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// "nx,ny" in normalized page coordinates
fn parse_position(value: &str) -> Result<NormalizedPosition> {
    let (nx, ny) = value
        .split_once(',')
        .with_context(|| format!("Position must look like 0.7,0.85, got {}", value))?;
    let nx: f64 = nx.trim().parse().context("Invalid x position")?;
    let ny: f64 = ny.trim().parse().context("Invalid y position")?;
    Ok(NormalizedPosition::new(nx, ny))
}

/// Comma-separated page numbers, order kept
fn parse_order(value: &str) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().with_context(|| format!("Invalid page number: {}", p)))
        .collect()
}

fn build_renderer(config: &AppConfig) -> Option<Box<dyn PageRenderer>> {
    #[cfg(feature = "pdfium")]
    {
        use pdfworks_core::raster::pdfium::PdfiumRenderer;
        match PdfiumRenderer::new(config.renderer.library_dir.as_deref()) {
            Ok(renderer) => return Some(Box::new(renderer)),
            Err(e) => warn!("pdfium unavailable, rasterizing operations are limited: {}", e),
        }
    }
    #[cfg(not(feature = "pdfium"))]
    if config.renderer.library_dir.is_some() {
        warn!("Built without the pdfium feature; ignoring renderer.library_dir");
    }
    None
}

/// Turn a document subcommand into an engine command
fn to_pdf_command(command: Command) -> Result<(PdfCommand, PathBuf)> {
    let built = match command {
        Command::Merge { inputs, output } => {
            let files = inputs.iter().map(|p| read(p)).collect::<Result<Vec<_>>>()?;
            (PdfCommand::Merge { files }, output)
        }
        Command::Split {
            input,
            ranges,
            out_dir,
        } => (
            PdfCommand::Split {
                file: read(&input)?,
                ranges: pdfworks_core::pages::parse_range_pairs(&ranges)?,
            },
            out_dir,
        ),
        Command::Extract { input, pages, output } => (
            PdfCommand::Extract {
                file: read(&input)?,
                pages: parse_ranges(&pages)?,
            },
            output,
        ),
        Command::Reorder { input, order, output } => (
            PdfCommand::Reorder {
                file: read(&input)?,
                order: parse_order(&order)?,
            },
            output,
        ),
        Command::Delete { input, pages, output } => (
            PdfCommand::Delete {
                file: read(&input)?,
                pages: parse_ranges(&pages)?,
            },
            output,
        ),
        Command::Rotate {
            input,
            angle,
            pages,
            output,
        } => (
            PdfCommand::Rotate {
                file: read(&input)?,
                pages,
                angle,
            },
            output,
        ),
        Command::Crop {
            input,
            top,
            right,
            bottom,
            left,
            unit,
            pages,
            output,
        } => (
            PdfCommand::Crop {
                file: read(&input)?,
                pages,
                margins: CropMargins {
                    top,
                    right,
                    bottom,
                    left,
                    unit,
                },
            },
            output,
        ),
        Command::Watermark {
            input,
            text,
            image,
            preset,
            opacity,
            rotation,
            font_size,
            color,
            position,
            pages,
            output,
        } => {
            let defaults = WatermarkStyle::default();
            let style = WatermarkStyle {
                opacity: opacity.unwrap_or(defaults.opacity),
                rotation: rotation.unwrap_or(defaults.rotation),
                font_size: font_size.unwrap_or(defaults.font_size),
                color: color.unwrap_or_else(|| defaults.color.clone()),
                position: position.as_deref().map(parse_position).transpose()?,
                ..defaults
            };
            let image = image.as_deref().map(read).transpose()?;
            (
                PdfCommand::Watermark {
                    file: read(&input)?,
                    image,
                    options: WatermarkRequest {
                        text,
                        image: None,
                        preset,
                        style,
                        pages,
                    },
                },
                output,
            )
        }
        Command::PageNumbers {
            input,
            format,
            position,
            start,
            pages,
            output,
        } => {
            let mut options = PageNumberOptions {
                format,
                position,
                ..PageNumberOptions::default()
            };
            options.style.start_number = start;
            options.style.pages = pages;
            (
                PdfCommand::PageNumbers {
                    file: read(&input)?,
                    options,
                },
                output,
            )
        }
        Command::HeaderFooter {
            input,
            header,
            footer,
            pages,
            output,
        } => {
            let mut options = HeaderFooterOptions {
                header,
                footer,
                ..HeaderFooterOptions::default()
            };
            options.style.pages = pages;
            (
                PdfCommand::HeaderFooter {
                    file: read(&input)?,
                    options,
                },
                output,
            )
        }
        Command::Flatten { input, output } => (PdfCommand::Flatten { file: read(&input)? }, output),
        Command::Annotate {
            input,
            annotations,
            output,
        } => {
            let list: Vec<Annotation> = serde_json::from_slice(&read(&annotations)?)
                .with_context(|| format!("Invalid annotations in {}", annotations.display()))?;
            (
                PdfCommand::Annotate {
                    file: read(&input)?,
                    annotations: list,
                },
                output,
            )
        }
        Command::Sign {
            input,
            image,
            text,
            page,
            position,
            width,
            output,
        } => (
            PdfCommand::Sign {
                file: read(&input)?,
                page,
                position: position
                    .as_deref()
                    .map(parse_position)
                    .transpose()?
                    .unwrap_or_default(),
                width,
                image: image.as_deref().map(read).transpose()?,
                text,
            },
            output,
        ),
        Command::Compress { input, level, output } => (
            PdfCommand::Compress {
                file: read(&input)?,
                level,
            },
            output,
        ),
        Command::Unlock {
            input,
            password,
            output,
        } => (
            PdfCommand::Unlock {
                file: read(&input)?,
                password,
            },
            output,
        ),
        Command::Protect {
            input,
            user_password,
            owner_password,
            algorithm,
            restrict,
            output,
        } => {
            let settings = EncryptionSettings {
                owner_password: owner_password.unwrap_or_default(),
                permissions: if restrict {
                    Permissions::none()
                } else {
                    Permissions::all()
                },
                algorithm: match algorithm {
                    Algorithm::Aes128 => EncryptionAlgorithm::Aes128,
                    Algorithm::Rc4 => EncryptionAlgorithm::Rc4_128,
                },
                ..EncryptionSettings::new(user_password)
            };
            (
                PdfCommand::Protect {
                    file: read(&input)?,
                    settings,
                },
                output,
            )
        }
        Command::Compare {
            left,
            right,
            output,
            ..
        } => (
            PdfCommand::Compare {
                left: read(&left)?,
                right: read(&right)?,
            },
            output,
        ),
        Command::Metadata {
            input,
            password,
            title,
            author,
            subject,
            keywords,
            output,
        } => {
            let output = output.context("--output is required when updating metadata")?;
            (
                PdfCommand::Metadata {
                    file: read(&input)?,
                    password,
                    metadata: DocumentMetadata {
                        title,
                        author,
                        subject,
                        keywords,
                        ..DocumentMetadata::default()
                    },
                },
                output,
            )
        }
        Command::Run { command, output } => {
            let json = read(&command)?;
            let parsed: PdfCommand = serde_json::from_slice(&json)
                .with_context(|| format!("Invalid command in {}", command.display()))?;
            (parsed, output)
        }
        Command::Info { .. } | Command::Convert { .. } => {
            bail!("Not a document command")
        }
    };
    Ok(built)
}

/// Ask the AI advisory for a quality when the smart level needs one
async fn advice_for(command: &PdfCommand, config: &AppConfig) -> Option<FixedAdvice> {
    let PdfCommand::Compress {
        file,
        level: CompressionLevel::Smart,
    } = command
    else {
        return None;
    };
    let page_count = get_page_count(file).ok()?;
    let stats = DocumentStats {
        size_bytes: file.len(),
        page_count,
    };
    let client = AiClient::new(reqwest::Client::new(), config.ai.clone());
    Some(FixedAdvice(client.recommend_compression(&stats).await))
}

fn write_output(output: CommandOutput, path: &Path, stem: &str, report: Option<&Path>) -> Result<()> {
    match output {
        CommandOutput::Document(bytes) => write(path, &bytes)?,
        CommandOutput::Documents(documents) => {
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            for (i, bytes) in documents.iter().enumerate() {
                write(&path.join(format!("{}-{}.pdf", stem, i + 1)), bytes)?;
            }
        }
        CommandOutput::Compressed(outcome) => {
            info!(
                "Compression: {:?}, {} -> {} bytes ({:.1}% saved)",
                outcome.method,
                outcome.original_size,
                outcome.compressed_size,
                outcome.saved_ratio() * 100.0
            );
            write(path, &outcome.bytes)?;
        }
        CommandOutput::Compared { document, report: comparison } => {
            write(path, &document)?;
            let json = serde_json::to_string_pretty(&comparison)?;
            match report {
                Some(report) => write(report, json.as_bytes())?,
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}

async fn run_document_command(command: Command, config: &AppConfig) -> Result<()> {
    let stem = match &command {
        Command::Split { input, .. } => input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("part")
            .to_string(),
        _ => "part".to_string(),
    };
    let report = match &command {
        Command::Compare { report, .. } => report.clone(),
        _ => None,
    };

    let (pdf_command, output) = to_pdf_command(command)?;
    let advice = advice_for(&pdf_command, config).await;
    let renderer = build_renderer(config);
    let advisor: &dyn CompressionAdvisor = match &advice {
        Some(advice) => advice,
        None => &NoAdvice,
    };
    let ctx = EngineContext {
        config: config.engine,
        renderer: renderer.as_deref(),
        advisor,
    };

    let mut sink = |event: ConversionProgress| {
        let message = event.message.unwrap_or_default();
        match event.status {
            ProgressStatus::Error => warn!("[{:>3}%] {}", event.progress, message),
            _ => info!("[{:>3}%] {}", event.progress, message),
        }
    };
    let mut progress = ProgressReporter::new(&mut sink);
    let result = execute_command(&pdf_command, &ctx, &mut progress)?;
    write_output(result, &output, &stem, report.as_deref())
}

fn log_level(verbose: bool) -> tracing::Level {
    if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // stdout carries JSON output; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level(args.verbose).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Info { input } => {
            let info = inspect_document(&read(&input)?)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Metadata {
            input,
            password,
            title: None,
            author: None,
            subject: None,
            keywords: None,
            ..
        } => {
            let doc = load_document(&read(&input)?, password.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&read_metadata(&doc))?);
        }
        Command::Convert { input, to, output } => {
            let file_name = input
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("input")
                .to_string();
            let converter = OfficeConverter::new(config.converter.clone());
            let response = converter
                .convert(ConversionRequest {
                    bytes: read(&input)?,
                    file_name,
                    target: to,
                })
                .await?;
            info!("Converted to {}", response.mime_type);
            write(&output, &response.bytes)?;
        }
        command => run_document_command(command, &config).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_raises_log_level() {
        let args = Args::try_parse_from(["pdfworks", "info", "in.pdf", "--verbose"]).unwrap();
        assert!(args.verbose);
        assert_eq!(log_level(args.verbose), tracing::Level::DEBUG);

        let args = Args::try_parse_from(["pdfworks", "info", "in.pdf"]).unwrap();
        assert_eq!(log_level(args.verbose), tracing::Level::INFO);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "pdfworks", "rotate", "in.pdf", "--angle", "90", "--pages", "odd", "-o", "out.pdf",
        ])
        .unwrap();
        match args.command {
            Command::Rotate { angle, pages, .. } => {
                assert_eq!(angle, 90);
                assert_eq!(pages, PageSelection::Odd);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_compression_level_is_rejected() {
        assert!(Args::try_parse_from(["pdfworks", "compress", "in.pdf", "--level", "huge", "-o", "x.pdf"]).is_err());
    }

    #[test]
    fn test_metadata_without_fields_needs_no_output() {
        let args = Args::try_parse_from(["pdfworks", "metadata", "in.pdf"]).unwrap();
        assert!(matches!(args.command, Command::Metadata { output: None, .. }));
    }

    #[test]
    fn test_parse_position() {
        let pos = parse_position("0.25, 0.5").unwrap();
        assert_eq!((pos.nx, pos.ny), (0.25, 0.5));
        assert!(parse_position("0.25").is_err());
    }

    #[test]
    fn test_parse_order_keeps_order() {
        assert_eq!(parse_order("3, 1,2").unwrap(), vec![3, 1, 2]);
        assert!(parse_order("1,x").is_err());
    }
}
