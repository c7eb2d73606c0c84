/// xmodel terminal viewer
///
/// Renders a page of model elements in the terminal.
/// Controls:
///   - WASD / Arrow Keys: Rotate spinning models
///   - E/R: Roll rotation
///   - L: Reload models
///   - H: Hide / show model elements
///   - Q/ESC: Quit
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xmodel_terminal::page::{Page, ViewportConfig};
use xmodel_terminal::TerminalApp;

#[derive(Parser, Debug)]
#[command(name = "xmodel-terminal")]
#[command(about = "Render CSS-placed 3D models as ASCII art")]
#[command(version)]
#[command(group(ArgGroup::new("input").required(true).args(["page", "model"])))]
struct Args {
    /// Page description (TOML)
    page: Option<PathBuf>,

    /// Show a single OBJ or STL model instead of a page
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Log file (the terminal itself is taken by the renderer)
    #[arg(long, default_value = "xmodel-terminal.log")]
    log_file: PathBuf,

    /// Log filter, e.g. `info` or `xmodel_core=debug`
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log = File::create(&args.log_file)
        .with_context(|| format!("creating log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level)?)
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .with_target(true)
        .init();

    info!("xmodel-terminal v{}", env!("CARGO_PKG_VERSION"));

    let page = match (&args.page, &args.model) {
        (Some(path), _) => Page::load(path)?,
        (None, Some(model)) => Page::single_model(model, ViewportConfig::default()),
        (None, None) => anyhow::bail!("either a page or --model is required"),
    };

    let mut app = TerminalApp::new(page, args.fps)?;
    app.run()?;

    info!("exiting");
    Ok(())
}
