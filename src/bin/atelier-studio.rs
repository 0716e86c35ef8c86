// Atelier Studio - terminal surface for the image generation workflows

use atelier::workflow::{
    Availability, HttpMediaService, ImagePayload, ImageVariationPipeline, MediaService, Phase,
    PresentationSurface, StateSnapshot, StudioConfig, TextToImagePipeline, WorkflowError,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use termimad::{MadSkin, crossterm::style::Color};
use tracing_subscriber::EnvFilter;

/// Prints phase banners and error lines as the pipelines move
struct ConsoleSurface {
    label: &'static str,
}

impl PresentationSurface for ConsoleSurface {
    fn state_changed(&self, snapshot: &StateSnapshot) {
        match snapshot.phase {
            Phase::Deriving => println!("⏳ [{}] Enhancing...", self.label),
            Phase::Analyzing => println!("⏳ [{}] Analyzing...", self.label),
            Phase::Generating => println!("⏳ [{}] Generating...", self.label),
            Phase::Failed => {
                if let Some(message) = &snapshot.error_message {
                    println!("❌ [{}] {}", self.label, message);
                }
            }
            phase => println!("● [{}] {}", self.label, phase.as_str()),
        }
    }
}

fn create_markdown_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.headers[0].set_fg(Color::Cyan);
    skin.bold.set_fg(Color::White);
    skin.italic.set_fg(Color::Magenta);
    skin
}

fn load_config() -> StudioConfig {
    let mut config: StudioConfig = dirs::config_dir()
        .map(|d| d.join("atelier/config.json"))
        .filter(|p| p.exists())
        .and_then(|path| {
            let raw = std::fs::read_to_string(&path).ok()?;
            match serde_json::from_str(&raw) {
                Ok(config) => Some(config),
                Err(e) => {
                    eprintln!("Warning: ignoring malformed config {}: {}", path.display(), e);
                    None
                }
            }
        })
        .unwrap_or_default();

    if let Ok(endpoint) = std::env::var("ATELIER_ENDPOINT") {
        config.endpoint = endpoint;
    }
    config
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn save_image(image: &ImagePayload, dir: &Path, prefix: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("{}-{}.png", prefix, stamp));
    std::fs::write(&path, &image.bytes)?;
    Ok(path)
}

fn print_usage() {
    println!("Commands:");
    println!("  <text>          enhance a prompt (then /approve or /edit)");
    println!("  /approve        approve the enhanced prompt");
    println!("  /edit           take the enhanced prompt back for editing");
    println!("  /generate       generate an image from the approved prompt");
    println!("  /upload <path>  load a source image");
    println!("  /analyze        describe the uploaded image");
    println!("  /variation      generate a variation from the analysis");
    println!("  /ok             dismiss an error banner");
    println!("  /status         show both pipeline phases");
    println!("  exit");
}

fn report(result: Result<(), WorkflowError>) {
    if let Err(e) = result {
        match e {
            // Service failures were already shown by the surface banner
            WorkflowError::Service(_) => {}
            other => println!("⚠️  {}", other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Atelier Studio v{}\n", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let service = Arc::new(HttpMediaService::new(&config));
    println!("Backend: {}", service.base_url());

    match service.check_availability().await {
        Ok(Availability { ready: true }) => println!("Status: ready\n"),
        Ok(Availability { ready: false }) => println!("Status: API key not configured\n"),
        Err(e) => println!("Status: cannot connect to server ({})\n", e),
    }

    let mut text_pipeline = TextToImagePipeline::new(service.clone())
        .with_surface(Arc::new(ConsoleSurface { label: "prompt" }));
    let mut variation_pipeline = ImageVariationPipeline::new(service.clone())
        .with_surface(Arc::new(ConsoleSurface { label: "variation" }));

    let skin = create_markdown_skin();
    print_usage();
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match input.split_once(' ').map_or((input, ""), |(c, r)| (c, r.trim())) {
            ("/approve", _) => {
                report(text_pipeline.approve());
                if let Some(text) = &text_pipeline.state().approved_text {
                    skin.print_text(&format!("**Approved:** {}\n", text));
                }
            }
            ("/edit", _) => match text_pipeline.edit_again() {
                Ok(text) => {
                    println!("Back in your input:");
                    skin.print_text(&format!("> {}\n", text));
                }
                Err(e) => report(Err(e)),
            },
            ("/generate", _) => {
                report(text_pipeline.generate().await);
                if let Some(image) = &text_pipeline.state().produced_image {
                    let path = save_image(image, &config.output_dir, "generated")?;
                    println!("💾 Saved {}", path.display());
                }
            }
            ("/upload", path) if !path.is_empty() => {
                let path = PathBuf::from(path);
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        report(variation_pipeline.upload(bytes, mime_type_for(&path)));
                    }
                    Err(e) => println!("⚠️  Cannot read {}: {}", path.display(), e),
                }
            }
            ("/upload", _) => println!("Usage: /upload <path>"),
            ("/analyze", _) => {
                report(variation_pipeline.analyze().await);
                if let Some(analysis) = &variation_pipeline.state().derived_text {
                    skin.print_text(&format!("**Analysis:** {}\n", analysis));
                }
            }
            ("/variation", _) => {
                report(variation_pipeline.generate().await);
                if let Some(image) = &variation_pipeline.state().produced_image {
                    let path = save_image(image, &config.output_dir, "variation")?;
                    println!("💾 Saved {}", path.display());
                }
            }
            ("/ok", _) => {
                text_pipeline.acknowledge_error();
                variation_pipeline.acknowledge_error();
            }
            ("/status", _) => {
                println!("  prompt:    {}", text_pipeline.state().phase.as_str());
                println!("  variation: {}", variation_pipeline.state().phase.as_str());
            }
            ("/help", _) => print_usage(),
            (command, _) if command.starts_with('/') => {
                println!("Unknown command {} (/help for the list)", command);
            }
            _ => {
                report(text_pipeline.submit_prompt(input).await);
                if let Some(text) = &text_pipeline.state().derived_text {
                    skin.print_text(&format!("**Enhanced:** {}\n", text));
                    println!("(/approve to commit, /edit to revise)");
                }
            }
        }
    }

    Ok(())
}
