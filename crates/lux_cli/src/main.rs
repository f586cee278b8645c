//! `lux`: render a scene description with the photon-mapping renderer.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use lux_core::SceneDescription;
use lux_renderer::{RenderConfig, Renderer, Scene};

/// Offline photon-mapping renderer
#[derive(Parser, Debug)]
#[command(name = "lux", version, about, long_about = None)]
struct Cli {
    /// Scene description (JSON). Renders the built-in two-spheres scene
    /// when omitted.
    scene: Option<PathBuf>,

    /// Output image (PNG)
    #[arg(short, long, default_value = "lux.png")]
    output: PathBuf,

    /// Override the image width
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Override the image height
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Override the camera rays per pixel
    #[arg(short, long)]
    samples: Option<u32>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Read irradiance straight from the photon map at primary hits
    #[arg(long)]
    no_final_gather: bool,

    /// Trace volumetric photons into fog
    #[arg(long)]
    volumetric: bool,

    /// Worker threads (defaults to one per core)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Write the effective scene description as JSON and exit
    #[arg(long, value_name = "FILE")]
    dump_scene: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, desc: &mut SceneDescription) {
        if let Some(width) = self.width {
            desc.camera.width = width;
        }
        if let Some(height) = self.height {
            desc.camera.height = height;
        }
        if let Some(samples) = self.samples {
            desc.render.samples_per_pixel = samples;
        }
        if let Some(seed) = self.seed {
            desc.render.seed = seed;
        }
        if self.no_final_gather {
            desc.render.final_gather = false;
        }
        if self.volumetric {
            desc.render.volumetric_photons = true;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the render thread pool")?;
    }

    let mut desc = match &cli.scene {
        Some(path) => SceneDescription::from_file(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?,
        None => {
            log::info!("No scene given, rendering the two-spheres scene");
            SceneDescription::two_spheres()
        }
    };
    cli.apply_overrides(&mut desc);

    if let Some(path) = &cli.dump_scene {
        let json = serde_json::to_string_pretty(&desc).context("failed to serialize scene")?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Wrote scene description to {}", path.display());
        return Ok(());
    }

    let start = Instant::now();
    let mut scene = Scene::from_description(&desc).context("failed to build scene")?;
    log::info!(
        "Scene built in {:.2?}: {} shapes, {} lights, {} photon sources",
        start.elapsed(),
        scene.shapes().len(),
        scene.lights().len(),
        scene.photon_sources().len()
    );

    let start = Instant::now();
    let image = Renderer::new(RenderConfig::from(&desc.render)).render(&mut scene);
    log::info!("Rendered in {:.2?}", start.elapsed());

    image
        .save_png(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    log::info!("Saved {}", cli.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["lux", "-W", "32", "--seed", "9", "--no-final-gather"]);
        let mut desc = SceneDescription::two_spheres();
        cli.apply_overrides(&mut desc);

        assert_eq!(desc.camera.width, 32);
        assert_eq!(desc.camera.height, SceneDescription::two_spheres().camera.height);
        assert_eq!(desc.render.seed, 9);
        assert!(!desc.render.final_gather);
        assert!(cli.scene.is_none());
    }

    #[test]
    fn test_scene_path_is_positional() {
        let cli = Cli::parse_from(["lux", "scenes/box.json", "-o", "box.png"]);
        assert_eq!(cli.scene, Some(PathBuf::from("scenes/box.json")));
        assert_eq!(cli.output, PathBuf::from("box.png"));
    }
}
