//! Top-level render loop and image output.
//!
//! Rendering a scene runs the photon pass (once, cached on the scene), then
//! shades every pixel. Rows are rendered in order and the pixels of a row in
//! parallel; each pixel draws from its own generator seeded from the render
//! seed and its coordinates, so the result does not depend on scheduling.

use std::path::Path;

use lux_core::RenderSettings;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::integrator::Integrator;
use crate::scene::Scene;
use crate::Color;

/// Render configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Camera rays per pixel. One ray goes through the pixel centre, more
    /// are jittered.
    pub samples_per_pixel: u32,
    /// Maximum camera-ray recursion depth
    pub max_depth: u32,
    /// Maximum photon bounces
    pub max_photon_bounces: u32,
    /// Maximum ray-march steps per fog interval
    pub max_march_steps: u32,
    /// Gather the hemisphere at primary hits instead of reading the photon
    /// map directly
    pub final_gather: bool,
    /// Deposit photons in fog volumes
    pub volumetric_photons: bool,
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from(&RenderSettings::default())
    }
}

impl From<&RenderSettings> for RenderConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            samples_per_pixel: settings.samples_per_pixel,
            max_depth: settings.max_depth,
            max_photon_bounces: settings.max_photon_bounces,
            max_march_steps: settings.max_march_steps,
            final_gather: settings.final_gather,
            volumetric_photons: settings.volumetric_photons,
            seed: settings.seed,
        }
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Clamp a value to [0, 1] range.
#[inline]
pub fn clamp_01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (255.0 * clamp_01(linear_to_gamma(color.x))) as u8;
    let g = (255.0 * clamp_01(linear_to_gamma(color.y))) as u8;
    let b = (255.0 * clamp_01(linear_to_gamma(color.z))) as u8;
    [r, g, b, 255]
}

/// Simple image buffer for storing render output.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width * height) as usize],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity((self.width * self.height * 4) as usize);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }

    /// Write the gamma-corrected image as a PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.to_rgba(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
    }
}

/// Seed for the generator of pixel `(x, y)`.
fn pixel_seed(seed: u64, x: u32, y: u32) -> u64 {
    let index = ((y as u64) << 32) | x as u64;
    seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Render a single pixel, averaging its camera rays.
pub fn render_pixel(integrator: &Integrator, x: u32, y: u32) -> Color {
    let config = integrator.config();
    let camera = &integrator.scene().camera;
    let mut rng = StdRng::seed_from_u64(pixel_seed(config.seed, x, y));

    let samples = config.samples_per_pixel.max(1);
    let mut color = Color::ZERO;
    for _ in 0..samples {
        let ray = if samples == 1 {
            camera.center_ray(x, y)
        } else {
            camera.get_ray(x, y, &mut rng)
        };
        color += integrator.recursive_render(ray, &mut rng, 0, config.final_gather);
    }
    color / samples as f64
}

/// Photon-mapping renderer.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `scene` from its camera, tracing its photon maps first if
    /// they are not cached yet.
    pub fn render(&self, scene: &mut Scene) -> ImageBuffer {
        let maps = scene.ensure_photon_maps(&self.config);
        let scene: &Scene = scene;

        let width = scene.camera.x_res();
        let height = scene.camera.y_res();
        let integrator = Integrator::new(scene, &maps, &self.config);
        let mut image = ImageBuffer::new(width, height);

        log::info!(
            "Rendering {}x{} at {} samples per pixel",
            width,
            height,
            self.config.samples_per_pixel
        );
        let report_every = (height / 10).max(1);

        for y in 0..height {
            let row: Vec<Color> = (0..width)
                .into_par_iter()
                .map(|x| render_pixel(&integrator, x, y))
                .collect();
            let start = (y * width) as usize;
            image.pixels[start..start + width as usize].copy_from_slice(&row);

            if (y + 1) % report_every == 0 || y + 1 == height {
                log::info!("Rendered {}/{} rows", y + 1, height);
            }
        }

        let cutoffs = integrator.depth_cutoffs();
        if cutoffs > 0 {
            log::warn!(
                "{} rays reached the recursion limit of {} and were treated as black",
                cutoffs,
                self.config.max_depth
            );
        }
        let march_cutoffs = integrator.march_cutoffs();
        if march_cutoffs > 0 {
            log::warn!(
                "{} fog intervals reached the march limit of {} steps",
                march_cutoffs,
                self.config.max_march_steps
            );
        }

        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_core::SceneDescription;

    #[test]
    fn test_linear_to_gamma() {
        assert_eq!(linear_to_gamma(0.0), 0.0);
        assert_eq!(linear_to_gamma(-1.0), 0.0);
        assert!((linear_to_gamma(1.0) - 1.0).abs() < 1e-12);
        assert!((linear_to_gamma(0.25) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::ZERO), [0, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::new(1.0, 4.0, 0.25)), [255, 255, 127, 255]);
    }

    #[test]
    fn test_image_buffer() {
        let mut image = ImageBuffer::new(3, 2);
        image.set(2, 1, Color::ONE);
        assert_eq!(image.get(2, 1), Color::ONE);
        assert_eq!(image.pixels[5], Color::ONE);
        assert_eq!(image.to_rgba().len(), 24);
    }

    #[test]
    fn test_pixel_seeds_differ() {
        assert_ne!(pixel_seed(0, 0, 0), pixel_seed(0, 1, 0));
        assert_ne!(pixel_seed(0, 1, 0), pixel_seed(0, 0, 1));
        assert_ne!(pixel_seed(1, 0, 0), pixel_seed(0, 0, 0));
    }

    #[test]
    fn test_render_small_scene() {
        let mut desc = SceneDescription::two_spheres();
        desc.camera.width = 8;
        desc.camera.height = 8;
        desc.settings.mc_samples = 4;
        desc.photon_sources = match desc.photon_sources.remove(0) {
            lux_core::PhotonSourceDescription::IsotropicPoint {
                position,
                color,
                power,
                ..
            } => vec![lux_core::PhotonSourceDescription::IsotropicPoint {
                position,
                color,
                power,
                photons: 2000,
            }],
            other => vec![other],
        };

        let mut scene = Scene::from_description(&desc).unwrap();
        let renderer = Renderer::new(RenderConfig::from(&desc.render));
        let image = renderer.render(&mut scene);

        assert_eq!(image.pixels.len(), 64);
        assert!(image.pixels.iter().all(|c| c.is_finite() && c.min_element() >= 0.0));
        // The centre looks at the lit small sphere
        assert!(image.get(4, 4).x > 0.0);
    }
}
