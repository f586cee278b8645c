//! Renders the two-spheres test scene and saves it as a PNG.
//!
//! ```text
//! cargo run --release -p lux_renderer --example two_spheres [output.png]
//! ```

use std::time::Instant;

use lux_core::SceneDescription;
use lux_renderer::{RenderConfig, Renderer, Scene};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "two_spheres.png".to_string());

    let mut desc = SceneDescription::two_spheres();
    desc.camera.width = 256;
    desc.camera.height = 256;

    let mut scene = match Scene::from_description(&desc) {
        Ok(scene) => scene,
        Err(e) => {
            log::error!("Failed to build scene: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let image = Renderer::new(RenderConfig::from(&desc.render)).render(&mut scene);
    log::info!("Rendered in {:.2?}", start.elapsed());

    if let Err(e) = image.save_png(&output) {
        log::error!("Failed to write {}: {}", output, e);
        std::process::exit(1);
    }
    log::info!("Saved {}", output);
}
