//! iview-tiler - CLI for generating `.iview2` tile pyramids.
//!
//! This binary resolves the output location, runs the tiler and prints
//! the resulting pyramid properties.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iview_tiler::{resolve_cli_input, Config, ImageTiler};

fn main() {
    // Parse configuration from CLI and environment
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    let Some(image) = config.image else {
        // validate() already rejected a missing image
        std::process::exit(1);
    };

    // Resolve where the archive goes and which relative path it keeps
    let (default_tile_dir, image_path) = resolve_cli_input(&image);
    let tile_dir = config.tile_dir.unwrap_or(default_tile_dir);
    println!("Tile to directory: {}", tile_dir.display());

    let mut tiler = ImageTiler::new(image, config.derivate, image_path);
    tiler.set_tile_dir(tile_dir);
    tiler.set_memory_saving_threshold(config.threshold);

    match tiler.tile() {
        Ok(props) => println!("Tiling complete: {props:?}"),
        Err(e) => {
            error!("Tiling failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "iview_tiler=debug"
    } else {
        "iview_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
