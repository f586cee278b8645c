//! Camera for ray generation.

use crate::{gen_f64, Ray};
use lux_core::CameraDescription;
use lux_core::description::vec3;
use lux_math::DVec3;
use rand::RngCore;

/// Pinhole perspective camera.
#[derive(Debug, Clone)]
pub struct Camera {
    // Image settings
    width: u32,
    height: u32,

    // Camera positioning
    look_from: DVec3,
    look_at: DVec3,
    vup: DVec3,

    /// Vertical field of view in degrees
    vfov: f64,
    /// Near and far clip distances along the ray
    near: f64,
    far: f64,

    // Cached computed values (set by initialize())
    center: DVec3,
    pixel00_loc: DVec3,
    pixel_delta_u: DVec3,
    pixel_delta_v: DVec3,
    u: DVec3,
    v: DVec3,
    w: DVec3,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            width: 512,
            height: 512,
            look_from: DVec3::new(0.0, -10.0, 0.0),
            look_at: DVec3::ZERO,
            vup: DVec3::Z,
            vfov: 45.0,
            near: 1e-3,
            far: f64::INFINITY,
            center: DVec3::ZERO,
            pixel00_loc: DVec3::ZERO,
            pixel_delta_u: DVec3::ZERO,
            pixel_delta_v: DVec3::ZERO,
            u: DVec3::X,
            v: DVec3::Y,
            w: DVec3::Z,
        };
        camera.initialize();
        camera
    }

    /// Build and initialize a camera from its description.
    pub fn from_description(desc: &CameraDescription) -> Self {
        let mut camera = Self::new()
            .with_resolution(desc.width, desc.height)
            .with_position(vec3(desc.look_from), vec3(desc.look_at), vec3(desc.up))
            .with_fov(desc.vfov)
            .with_clip(desc.near, desc.far);
        camera.initialize();
        camera
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: DVec3, look_at: DVec3, vup: DVec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f64) -> Self {
        self.vfov = vfov;
        self
    }

    /// Set the near and far clip distances.
    pub fn with_clip(mut self, near: f64, far: f64) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn x_res(&self) -> u32 {
        self.width
    }

    pub fn y_res(&self) -> u32 {
        self.height
    }

    /// Initialize the camera (must be called after changing settings).
    pub fn initialize(&mut self) {
        self.center = self.look_from;

        // Viewport one unit in front of the eye
        let theta = self.vfov.to_radians();
        let viewport_height = 2.0 * (theta / 2.0).tan();
        let aspect = self.width.max(1) as f64 / self.height.max(1) as f64;
        let viewport_width = viewport_height * aspect;

        // Calculate camera basis vectors
        self.w = (self.look_from - self.look_at).normalize_or_zero();
        self.u = self.vup.cross(self.w).normalize_or_zero();
        self.v = self.w.cross(self.u);

        let viewport_u = viewport_width * self.u;
        let viewport_v = -viewport_height * self.v;

        self.pixel_delta_u = viewport_u / self.width.max(1) as f64;
        self.pixel_delta_v = viewport_v / self.height.max(1) as f64;

        // Row 0 is the top of the image
        self.pixel00_loc = self.center - self.w - viewport_u / 2.0 - viewport_v / 2.0;
    }

    /// Ray through the continuous image position `(x, y)`; pixel `(i, j)`
    /// covers `[i, i+1) x [j, j+1)`.
    pub fn generate_ray(&self, x: f64, y: f64) -> Ray {
        let target = self.pixel00_loc + x * self.pixel_delta_u + y * self.pixel_delta_v;
        Ray::with_interval(self.center, target - self.center, self.near, self.far)
    }

    /// Ray through a uniformly jittered position inside pixel `(i, j)`.
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut dyn RngCore) -> Ray {
        self.generate_ray(i as f64 + gen_f64(rng), j as f64 + gen_f64(rng))
    }

    /// Ray through the centre of pixel `(i, j)`.
    pub fn center_ray(&self, i: u32, j: u32) -> Ray {
        self.generate_ray(i as f64 + 0.5, j as f64 + 0.5)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn looking_down_minus_z() -> Camera {
        let mut camera = Camera::new()
            .with_resolution(100, 100)
            .with_position(DVec3::ZERO, DVec3::new(0.0, 0.0, -1.0), DVec3::Y)
            .with_fov(90.0);
        camera.initialize();
        camera
    }

    #[test]
    fn test_camera_initialize() {
        let camera = looking_down_minus_z();
        assert_eq!(camera.center, DVec3::ZERO);
        assert!((camera.w - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = looking_down_minus_z();
        let ray = camera.generate_ray(50.0, 50.0);
        assert!(ray.direction.abs_diff_eq(-DVec3::Z, 1e-12));
        assert_eq!(ray.t_min, 1e-3);
    }

    #[test]
    fn test_image_corners() {
        let camera = looking_down_minus_z();

        // 90 degree fov: the top-left corner is at 45 degrees up and left
        let top_left = camera.generate_ray(0.0, 0.0).direction;
        assert!(top_left.abs_diff_eq(DVec3::new(-1.0, 1.0, -1.0).normalize(), 1e-12));

        let bottom_right = camera.generate_ray(100.0, 100.0).direction;
        assert!(bottom_right.abs_diff_eq(DVec3::new(1.0, -1.0, -1.0).normalize(), 1e-12));
    }

    #[test]
    fn test_jittered_ray_stays_in_pixel() {
        let camera = looking_down_minus_z();
        let mut rng = StdRng::seed_from_u64(42);
        // Intersection with the z = -1 image plane is linear in pixel position
        let on_plane = |ray: Ray| ray.direction / -ray.direction.z;
        let lo = on_plane(camera.generate_ray(10.0, 20.0));
        let hi = on_plane(camera.generate_ray(11.0, 21.0));
        for _ in 0..16 {
            let d = on_plane(camera.get_ray(10, 20, &mut rng));
            assert!(d.x >= lo.x.min(hi.x) && d.x <= lo.x.max(hi.x));
            assert!(d.y >= lo.y.min(hi.y) && d.y <= lo.y.max(hi.y));
        }
    }

    #[test]
    fn test_from_description_clip() {
        let desc = CameraDescription {
            near: 0.5,
            far: 100.0,
            ..Default::default()
        };
        let camera = Camera::from_description(&desc);
        let ray = camera.center_ray(0, 0);
        assert_eq!((ray.t_min, ray.t_max), (0.5, 100.0));
        assert_eq!((camera.x_res(), camera.y_res()), (512, 512));
    }
}
