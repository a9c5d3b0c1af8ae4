use anyhow::{Context, Result, bail};
use arboard::Clipboard;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use plant_doctor_core::{
    AnalysisResult, ImageProcessor, PlantDoctor,
    config::{Config, ConfigBuilder},
    init, report, ui,
};
use std::path::PathBuf;
use std::time::Duration;
use termimad::MadSkin;
use termimad::crossterm::style::Color;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect plant diseases from a photo using Gemini", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a plant photo and print the diagnosis
    Analyze {
        /// JPEG or PNG image of the plant
        image: PathBuf,

        /// Override the model defined in .env
        #[arg(short, long)]
        model: Option<String>,

        /// Print the raw result as JSON instead of a formatted report
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Copy the report to clipboard automatically
        #[arg(short, long, default_value_t = false)]
        copy: bool,
    },
    /// Open the desktop window (default)
    Gui {
        /// Image to load on startup
        image: Option<PathBuf>,

        /// Override the model defined in .env
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    init_tracing();
    let args = Args::parse();

    match args.command {
        Some(Command::Analyze {
            image,
            model,
            json,
            copy,
        }) => analyze(image, model, json, copy).await,
        Some(Command::Gui { image, model }) => run_gui(image, model),
        None => run_gui(None, None),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("plant_doctor_core=info,plant_doctor_cli=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn with_model_override(builder: ConfigBuilder, model: Option<String>) -> ConfigBuilder {
    match model {
        Some(m) => builder.with_model(m),
        None => builder,
    }
}

async fn analyze(image: PathBuf, model: Option<String>, json: bool, copy: bool) -> Result<()> {
    // Configuration first: without a key nothing else happens
    let config: Config = with_model_override(ConfigBuilder::from_env(), model)
        .build()
        .context("Failed to load configuration. Please configure your Gemini API key in the .env file")?;

    if !ImageProcessor::has_supported_extension(&image) {
        tracing::warn!(path = %image.display(), "file extension is not jpg/jpeg/png");
    }

    let doctor = PlantDoctor::with_config(config).context("Failed to create Gemini client")?;
    let decoded = doctor
        .load_image(&image)
        .with_context(|| format!("Failed to load image {}", image.display()))?;

    // Send to API
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.set_message(format!(
        "Analyzing image with {}...",
        doctor.config().model_name
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = doctor.analyze(&decoded).await;

    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if copy {
        copy_to_clipboard(&report::to_markdown(&result));
    }

    if let AnalysisResult::Error(err) = &result {
        bail!("Analysis failed: {}", err);
    }

    Ok(())
}

fn run_gui(image: Option<PathBuf>, model: Option<String>) -> Result<()> {
    let config = with_model_override(ConfigBuilder::from_env(), model);
    if !config.has_api_key() {
        tracing::warn!("GEMINI_API_KEY is not set; analysis stays disabled until a key is entered");
    }
    ui::run_app(config, image).context("Failed to run the desktop window")?;
    Ok(())
}

/// Prints a result with terminal styling.
fn print_result(result: &AnalysisResult) {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(Color::Yellow);
    skin.italic.set_fg(Color::Magenta);
    skin.code_block.set_bg(Color::Rgb { r: 40, g: 40, b: 40 });

    match result {
        AnalysisResult::Structured(_) => {
            println!("Analysis Complete!\n");
            skin.print_text(&report::to_markdown(result));
        }
        AnalysisResult::RawText(text) => {
            println!("Analysis Complete!\n");
            println!("{}", text);
        }
        AnalysisResult::Error(_) => {
            skin.bold.set_fg(Color::Red);
            eprintln!("{}", skin.term_text(&report::to_markdown(result)));
        }
    }
}

fn copy_to_clipboard(text: &str) {
    match Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text.to_string()) {
                eprintln!("Warning: Failed to copy to clipboard: {}", e);
            } else {
                println!("(Copied to clipboard)");
            }
        }
        Err(e) => eprintln!("Warning: Could not access clipboard: {}", e),
    }
}
