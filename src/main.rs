// ABOUTME: Main entry point for the deckling program.
// ABOUTME: Provides CLI interface for building and checking decks from HTML slides.

use clap::{Args, Parser, Subcommand};
use deckling::{
    utils, BrowserConverter, BrowserOptions, Config, DeckAssembler, DeckConfig, DeckError,
    LayoutPreset, MarkupConverter, Renderer, Result, SlideConverter,
};
use log::{debug, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble HTML slides into a PPTX deck
    Build(BuildArgs),

    /// Convert slides and report problems without writing a deck
    Check(CheckArgs),

    /// List the available layout presets
    Layouts,
}

#[derive(Args)]
struct RenderArgs {
    /// Converter used to turn HTML into slides
    #[arg(long, value_enum)]
    renderer: Option<Renderer>,

    /// Path to the Chrome executable for the browser renderer
    #[arg(long)]
    browser_path: Option<String>,

    /// Page load timeout for the browser renderer, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args)]
struct BuildArgs {
    /// Slide HTML files in deck order (glob patterns allowed)
    slides: Vec<String>,

    /// Path to the output PPTX file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Layout preset (16:9, 16:10, 4:3, wide)
    #[arg(short, long)]
    layout: Option<String>,

    /// Author recorded in the document properties
    #[arg(long)]
    author: Option<String>,

    /// Title recorded in the document properties
    #[arg(long)]
    title: Option<String>,

    /// JSON manifest supplying defaults for the other options
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args)]
struct CheckArgs {
    /// Slide HTML files to check (glob patterns allowed)
    slides: Vec<String>,

    /// Layout preset (16:9, 16:10, 4:3, wide)
    #[arg(short, long)]
    layout: Option<String>,

    #[command(flatten)]
    render: RenderArgs,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn make_converter(render: &RenderArgs) -> Result<Box<dyn SlideConverter>> {
    let env = Config::from_env()?;
    let renderer = render.renderer.unwrap_or(env.renderer);
    debug!("Using {} renderer", renderer);

    Ok(match renderer {
        Renderer::Markup => Box::new(MarkupConverter::default()),
        Renderer::Browser => Box::new(BrowserConverter::new(BrowserOptions {
            timeout_ms: render.timeout_ms.unwrap_or(env.timeout_ms),
            browser_path: render.browser_path.clone().or(env.browser_path),
        })),
    })
}

fn build_config(args: &BuildArgs) -> Result<DeckConfig> {
    let mut config = match &args.manifest {
        Some(manifest) => {
            info!("Reading manifest {:?}", manifest);
            DeckConfig::from_manifest(manifest)?
        }
        None => {
            let output = args.output.clone().ok_or_else(|| {
                DeckError::ConfigError("An output path is required (--output)".to_string())
            })?;
            DeckConfig::new(Vec::new(), output)
        }
    };

    if !args.slides.is_empty() {
        config.slide_sources = utils::expand_slide_sources(&args.slides)?;
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(layout) = &args.layout {
        config.layout_preset = layout.parse()?;
    }
    if let Some(author) = &args.author {
        config.author = author.clone();
    }
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    Ok(config)
}

fn build(args: &BuildArgs) -> Result<()> {
    let config = build_config(args)?;
    let mut assembler = DeckAssembler::new(make_converter(&args.render)?);
    let report = assembler.run(&config)?;

    println!(
        "Deck written: {} ({} slides, {})",
        report.output_path.display(),
        report.slide_count,
        config.layout_preset
    );
    for (index, placeholders) in report.placeholders.iter().enumerate() {
        for placeholder in placeholders {
            let frame = placeholder.frame;
            println!(
                "  slide {} placeholder {}: x={:.2}in y={:.2}in w={:.2}in h={:.2}in",
                index + 1,
                placeholder.id,
                frame.x,
                frame.y,
                frame.w,
                frame.h
            );
        }
    }
    Ok(())
}

fn check(args: &CheckArgs) -> Result<()> {
    let layout: LayoutPreset = match &args.layout {
        Some(layout) => layout.parse()?,
        None => LayoutPreset::default(),
    };
    let sources = utils::expand_slide_sources(&args.slides)?;
    if sources.is_empty() {
        return Err(DeckError::NoSlideSources);
    }
    for (index, source) in sources.iter().enumerate() {
        utils::validate_slide_source(index, source)?;
    }

    let mut converter = make_converter(&args.render)?;
    let mut first_failure = None;
    for (index, source) in sources.iter().enumerate() {
        match converter.convert(source, layout) {
            Ok(slide) => println!(
                "ok    {} ({} elements, {} placeholders)",
                source.display(),
                slide.elements.len(),
                slide.placeholders.len()
            ),
            Err(e) => {
                println!("FAIL  {}: {}", source.display(), e);
                if first_failure.is_none() {
                    first_failure = Some(DeckError::ConversionFailed {
                        index,
                        path: source.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Build(args) => build(args),
        Commands::Check(args) => check(args),
        Commands::Layouts => {
            for layout in LayoutPreset::ALL {
                let (w, h) = layout.size_inches();
                println!("{:<13} {:.3} x {:.3} in", layout.name(), w, h);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.kind(), e);
        std::process::exit(e.exit_code());
    }
}
