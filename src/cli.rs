use crate::config::load_config;
use crate::document::{parse_document, save_document, snapshot, restore};
use crate::layout::LayoutAlgorithm;
use crate::positions::PositionTracker;
use crate::registry::EntityRegistry;
use crate::render::{render, render_svg};
use crate::scene::{OrthogonalRouter, Scene};
use crate::viewport::Viewport;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erdiag", version, about = "Entity-relationship diagram layout engine")]
pub struct Args {
    /// Input diagram document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output diagram document. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout algorithm for entities without a stored position
    #[arg(short = 'l', long = "layout", value_enum, default_value = "grid")]
    pub layout: LayoutArg,

    /// Config JSON file overriding layout parameters
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Discard stored positions and place every entity from scratch
    #[arg(long = "relayout")]
    pub relayout: bool,

    /// Also write a static SVG export of the arranged diagram
    #[arg(long = "svg")]
    pub svg: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LayoutArg {
    Grid,
    Hierarchical,
    Force,
    Smart,
}

impl From<LayoutArg> for LayoutAlgorithm {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Grid => LayoutAlgorithm::Grid,
            LayoutArg::Hierarchical => LayoutAlgorithm::Hierarchical,
            LayoutArg::Force => LayoutAlgorithm::Force,
            LayoutArg::Smart => LayoutAlgorithm::Smart,
        }
    }
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let document = parse_document(&input)?;

    let mut registry = EntityRegistry::new();
    let mut scene = Scene::new();
    let mut tracker = PositionTracker::new();
    let mut viewport = Viewport::with_view(config.canvas.width, config.canvas.height);
    restore(
        &document,
        &mut registry,
        &mut scene,
        &mut tracker,
        &mut viewport,
    )?;

    if args.relayout {
        tracker.clear();
    }

    let router = OrthogonalRouter;
    render(
        &registry,
        &mut tracker,
        &mut scene,
        &mut viewport,
        &router,
        args.layout.into(),
        &config,
    );

    // The stored timestamp travels through untouched.
    let updated = snapshot(&registry, &scene, &viewport, document.timestamp.clone());
    match args.output.as_deref() {
        Some(path) => save_document(path, &updated)?,
        None => {
            let contents = serde_json::to_string_pretty(&updated)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if let Some(path) = &args.svg {
        std::fs::write(path, render_svg(&scene, &registry))?;
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return Ok(std::fs::read_to_string(path)?);
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
