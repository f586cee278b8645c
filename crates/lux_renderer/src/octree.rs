//! Octree of volumetric photons.
//!
//! Each photon is a small sphere of power. A photon is filed under every
//! cell its sphere overlaps, down to the depth limit or until a cell is
//! smaller than the photon, so radius queries only visit cells near the
//! query point.

use lux_math::{Aabb, Color, DVec3};
use std::f64::consts::PI;

/// Default subdivision limit.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// A photon scattered inside a participating medium.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumetricPhoton {
    pub position: DVec3,
    pub power: Color,
    pub radius: f64,
}

impl VolumetricPhoton {
    /// Power per unit volume over the photon's sphere.
    pub fn density(&self) -> Color {
        let volume = 4.0 / 3.0 * PI * self.radius.powi(3);
        if volume > 0.0 {
            self.power / volume
        } else {
            Color::ZERO
        }
    }
}

#[derive(Debug, Clone)]
struct OctreeNode {
    bounds: Aabb,
    depth: u32,
    objects: Vec<u32>,
    children: [Option<u32>; 8],
}

impl OctreeNode {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            objects: Vec::new(),
            children: [None; 8],
        }
    }

    /// Bounds of child `i`: bit 2 selects the upper x half, bit 1 y, bit 0 z.
    fn child_bounds(&self, i: usize) -> Aabb {
        let (lo, mid, hi) = (self.bounds.min(), self.bounds.centroid(), self.bounds.max());
        let pick = |bit: usize, axis: usize| {
            if i & bit != 0 {
                (mid[axis], hi[axis])
            } else {
                (lo[axis], mid[axis])
            }
        };
        let (x0, x1) = pick(4, 0);
        let (y0, y1) = pick(2, 1);
        let (z0, z1) = pick(1, 2);
        Aabb::enclosing([DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1)])
    }

    /// True if `p` lies within `radius` of the cell (box test). Points on
    /// a face belong to both cells sharing it.
    fn near(&self, p: DVec3, radius: f64) -> bool {
        let lo = self.bounds.min() - DVec3::splat(radius);
        let hi = self.bounds.max() + DVec3::splat(radius);
        p.cmpge(lo).all() && p.cmple(hi).all()
    }
}

/// Spatial index of [`VolumetricPhoton`]s inside fixed bounds.
#[derive(Debug, Clone)]
pub struct Octree {
    max_depth: u32,
    photons: Vec<VolumetricPhoton>,
    nodes: Vec<OctreeNode>,
}

impl Octree {
    /// Create an empty octree covering `bounds`.
    pub fn new(bounds: Aabb, max_depth: u32) -> Self {
        Self {
            max_depth,
            photons: Vec::new(),
            nodes: vec![OctreeNode::new(bounds, 0)],
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    /// Length of the diagonal of the root cell.
    pub fn diagonal(&self) -> f64 {
        self.bounds().diagonal().length()
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn photons(&self) -> &[VolumetricPhoton] {
        &self.photons
    }

    /// Insert a photon. Photons centred outside the root bounds are
    /// rejected with a warning and `false` is returned.
    pub fn add(&mut self, photon: VolumetricPhoton) -> bool {
        if !self.bounds().contains(photon.position) {
            log::warn!(
                "Volumetric photon at {:?} is outside the octree bounds, not inserted",
                photon.position
            );
            return false;
        }

        let id = self.photons.len() as u32;
        self.photons.push(photon);
        self.insert(0, id);
        true
    }

    fn insert(&mut self, node: usize, id: u32) {
        let photon = self.photons[id as usize];
        let (depth, diagonal, mid) = {
            let n = &self.nodes[node];
            (n.depth, n.bounds.diagonal().length(), n.bounds.centroid())
        };

        if depth >= self.max_depth || diagonal < photon.radius {
            self.nodes[node].objects.push(id);
            return;
        }

        let lo = photon.position - DVec3::splat(photon.radius);
        let hi = photon.position + DVec3::splat(photon.radius);
        let lower = [lo.x <= mid.x, lo.y <= mid.y, lo.z <= mid.z];
        let upper = [hi.x > mid.x, hi.y > mid.y, hi.z > mid.z];

        for child in 0..8 {
            let side = |bit: usize, axis: usize| {
                if child & bit != 0 {
                    upper[axis]
                } else {
                    lower[axis]
                }
            };
            if !(side(4, 0) && side(2, 1) && side(1, 2)) {
                continue;
            }

            let child_node = match self.nodes[node].children[child] {
                Some(c) => c as usize,
                None => {
                    let bounds = self.nodes[node].child_bounds(child);
                    let c = self.nodes.len();
                    self.nodes.push(OctreeNode::new(bounds, depth + 1));
                    self.nodes[node].children[child] = Some(c as u32);
                    c
                }
            };
            self.insert(child_node, id);
        }
    }

    /// Every photon whose sphere overlaps the sphere of `radius` around `p`.
    pub fn nearest(&self, p: DVec3, radius: f64) -> Vec<&VolumetricPhoton> {
        let mut ids = Vec::new();
        let mut todo = vec![0usize];

        while let Some(index) = todo.pop() {
            let node = &self.nodes[index];
            for &id in &node.objects {
                let photon = &self.photons[id as usize];
                let r = radius + photon.radius;
                if photon.position.distance_squared(p) < r * r {
                    ids.push(id);
                }
            }
            for child in node.children.iter().flatten() {
                if self.nodes[*child as usize].near(p, radius) {
                    todo.push(*child as usize);
                }
            }
        }

        // Photons straddling cells are filed more than once
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().map(|id| &self.photons[id as usize]).collect()
    }

    /// Sum of the densities of the photons whose spheres contain `p`.
    pub fn density_estimate(&self, p: DVec3) -> Color {
        self.nearest(p, 0.0).into_iter().map(VolumetricPhoton::density).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_octree() -> Octree {
        Octree::new(Aabb::enclosing([DVec3::ZERO, DVec3::ONE]), DEFAULT_MAX_DEPTH)
    }

    fn photon(position: DVec3, radius: f64) -> VolumetricPhoton {
        VolumetricPhoton {
            position,
            power: Color::ONE,
            radius,
        }
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let mut octree = unit_octree();
        assert!(!octree.add(photon(DVec3::splat(2.0), 0.1)));
        assert!(octree.is_empty());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut octree = unit_octree();
        for _ in 0..500 {
            let p = DVec3::new(rng.gen(), rng.gen(), rng.gen());
            assert!(octree.add(photon(p, rng.gen_range(0.01..0.1))));
        }

        for _ in 0..20 {
            let q = DVec3::new(rng.gen(), rng.gen(), rng.gen());
            let radius = rng.gen_range(0.0..0.2);

            let mut found: Vec<DVec3> =
                octree.nearest(q, radius).iter().map(|p| p.position).collect();
            let mut expected: Vec<DVec3> = octree
                .photons()
                .iter()
                .filter(|p| p.position.distance_squared(q) < (radius + p.radius).powi(2))
                .map(|p| p.position)
                .collect();

            let key = |v: &DVec3| (v.x, v.y, v.z);
            found.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap());
            expected.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap());
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_straddling_photon_reported_once() {
        let mut octree = unit_octree();
        octree.add(photon(DVec3::splat(0.5), 0.2));
        assert_eq!(octree.nearest(DVec3::splat(0.5), 0.0).len(), 1);
    }

    #[test]
    fn test_density_estimate() {
        let mut octree = unit_octree();
        let p = photon(DVec3::splat(0.5), 0.25);
        octree.add(p);

        let inside = octree.density_estimate(DVec3::splat(0.55));
        assert!((inside - p.density()).length() < 1e-12);
        assert_eq!(octree.density_estimate(DVec3::splat(0.9)), Color::ZERO);
    }

    #[test]
    fn test_query_on_cell_faces() {
        let mut octree = unit_octree();
        let p = photon(DVec3::splat(0.5), 0.2);
        octree.add(p);

        // The root centre and points on the faces between child cells
        for q in [
            DVec3::splat(0.5),
            DVec3::new(0.5, 0.6, 0.6),
            DVec3::new(0.6, 0.5, 0.4),
            DVec3::new(0.45, 0.55, 0.5),
            DVec3::new(0.625, 0.5, 0.5),
        ] {
            assert_eq!(octree.nearest(q, 0.0).len(), 1, "query at {:?}", q);
            assert!((octree.density_estimate(q) - p.density()).length() < 1e-12);
        }
    }
}
