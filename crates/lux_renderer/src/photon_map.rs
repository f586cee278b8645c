//! Photon map: a left-balanced kd-tree of photon hits.
//!
//! Photons are appended with [`PhotonMap::store`] during the photon pass.
//! [`PhotonMap::balance`] then rearranges them into an implicit kd-tree
//! (heap order, children of node `i` at `2i` and `2i + 1`, 1-based) that
//! answers k-nearest queries for irradiance estimates. Storing after the
//! balance or querying before it are contract violations and panic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::FRAC_1_PI;

use lux_math::{Aabb, Color, DVec3};

use crate::octree::Octree;

/// Fewer photons than this inside the search radius give a zero estimate.
pub const MIN_ESTIMATE_PHOTONS: usize = 2;

/// A stored photon hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photon {
    pub position: DVec3,
    pub power: Color,
    /// Direction of travel when the photon arrived
    pub direction: DVec3,
    /// Splitting axis once balanced
    plane: u8,
}

impl Photon {
    fn new(power: Color, position: DVec3, direction: DVec3) -> Self {
        Self {
            position,
            power,
            direction,
            plane: 0,
        }
    }
}

/// A candidate neighbour ordered by squared distance.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist2: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2.total_cmp(&other.dist2)
    }
}

/// Spatial index of photon hits supporting irradiance estimates.
#[derive(Debug, Clone, Default)]
pub struct PhotonMap {
    /// Insertion order before balancing, heap order (index 0 unused) after
    photons: Vec<Photon>,
    balanced: bool,
    bounds: Aabb,
}

impl PhotonMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a photon arriving at `position` travelling along `direction`.
    ///
    /// # Panics
    ///
    /// Panics if the map has already been balanced.
    pub fn store(&mut self, power: Color, position: DVec3, direction: DVec3) {
        assert!(!self.balanced, "PhotonMap::store called after balance()");
        self.bounds.enclose_point(position);
        self.photons.push(Photon::new(power, position, direction));
    }

    /// Number of stored photons.
    pub fn len(&self) -> usize {
        if self.balanced {
            self.photons.len().saturating_sub(1)
        } else {
            self.photons.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    /// Bounding box of the stored photon positions.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// The stored photons, in unspecified order.
    pub fn photons(&self) -> &[Photon] {
        if self.balanced && !self.photons.is_empty() {
            &self.photons[1..]
        } else {
            &self.photons
        }
    }

    /// Sum of the power of every stored photon.
    pub fn total_power(&self) -> Color {
        self.photons().iter().map(|p| p.power).sum()
    }

    /// Build the kd-tree. Further calls are no-ops.
    pub fn balance(&mut self) {
        if self.balanced {
            return;
        }
        self.balanced = true;

        let mut org = std::mem::take(&mut self.photons);
        let n = org.len();
        log::debug!("Balancing photon map with {} photons", n);
        if n == 0 {
            return;
        }

        let mut heap = vec![org[0]; n + 1];
        balance_segment(&mut org, &mut heap, 1);
        self.photons = heap;
    }

    /// Estimate irradiance at `position` with surface normal `normal` from the
    /// `n` photons nearest to it within `max_dist`.
    ///
    /// Only photons arriving against the normal contribute. The density is
    /// normalised by the area of the disc spanned by the farthest photon once
    /// `n` were found, by the full search disc otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the map has not been balanced.
    pub fn irradiance_estimate(
        &self,
        position: DVec3,
        normal: DVec3,
        max_dist: f64,
        n: usize,
    ) -> Color {
        assert!(
            self.balanced,
            "PhotonMap::irradiance_estimate called before balance()"
        );

        let mut found = BinaryHeap::with_capacity(n + 1);
        let mut max_dist2 = max_dist * max_dist;
        if self.photons.len() > 1 && n > 0 {
            self.locate_photons(1, position, n, &mut found, &mut max_dist2);
        }

        if found.len() < MIN_ESTIMATE_PHOTONS || max_dist2 <= 0.0 {
            return Color::ZERO;
        }

        let irradiance: Color = found
            .iter()
            .map(|c| &self.photons[c.index])
            .filter(|p| p.direction.dot(normal) < 0.0)
            .map(|p| p.power)
            .sum();

        irradiance * (FRAC_1_PI / max_dist2)
    }

    fn locate_photons(
        &self,
        index: usize,
        position: DVec3,
        n: usize,
        found: &mut BinaryHeap<Candidate>,
        max_dist2: &mut f64,
    ) {
        let photon = &self.photons[index];
        let stored = self.photons.len() - 1;

        if 2 * index <= stored {
            let axis = photon.plane as usize;
            let dist1 = position[axis] - photon.position[axis];
            let (near, far) = if dist1 > 0.0 {
                (2 * index + 1, 2 * index)
            } else {
                (2 * index, 2 * index + 1)
            };

            if near <= stored {
                self.locate_photons(near, position, n, found, max_dist2);
            }
            if far <= stored && dist1 * dist1 < *max_dist2 {
                self.locate_photons(far, position, n, found, max_dist2);
            }
        }

        let dist2 = photon.position.distance_squared(position);
        if dist2 < *max_dist2 {
            found.push(Candidate { dist2, index });
            if found.len() > n {
                found.pop();
            }
            if found.len() == n {
                if let Some(farthest) = found.peek() {
                    *max_dist2 = farthest.dist2;
                }
            }
        }
    }
}

/// Everything the photon pass produces.
#[derive(Debug, Clone, Default)]
pub struct PhotonMaps {
    /// Every photon stored on a diffuse surface
    pub global: PhotonMap,
    /// The subset that arrived through specular bounces only
    pub caustic: PhotonMap,
    /// Photons scattered inside fog volumes, if enabled
    pub volume: Option<Octree>,
}

impl PhotonMaps {
    pub fn balance(&mut self) {
        self.global.balance();
        self.caustic.balance();
    }
}

/// Number of nodes in the left subtree of a left-balanced tree of `n` nodes.
fn left_subtree_size(n: usize) -> usize {
    let mut m = 1;
    while 4 * m <= n {
        m *= 2;
    }
    if 3 * m <= n {
        2 * m - 1
    } else {
        n - m
    }
}

fn balance_segment(org: &mut [Photon], heap: &mut [Photon], index: usize) {
    let n = org.len();
    if n == 1 {
        heap[index] = org[0];
        return;
    }

    let bounds = Aabb::enclosing(org.iter().map(|p| p.position));
    let axis = bounds.longest_axis();
    let median = left_subtree_size(n);

    org.select_nth_unstable_by(median, |a, b| a.position[axis].total_cmp(&b.position[axis]));

    let mut node = org[median];
    node.plane = axis as u8;
    heap[index] = node;

    let (left, rest) = org.split_at_mut(median);
    let right = &mut rest[1..];
    if !left.is_empty() {
        balance_segment(left, heap, 2 * index);
    }
    if !right.is_empty() {
        balance_segment(right, heap, 2 * index + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_map(n: usize, seed: u64) -> PhotonMap {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut map = PhotonMap::new();
        for _ in 0..n {
            let p = DVec3::new(rng.gen(), rng.gen(), 0.0);
            map.store(Color::splat(1.0), p, -DVec3::Z);
        }
        map
    }

    #[test]
    fn test_left_subtree_size() {
        assert_eq!(left_subtree_size(1), 0);
        assert_eq!(left_subtree_size(2), 1);
        assert_eq!(left_subtree_size(3), 1);
        assert_eq!(left_subtree_size(4), 2);
        assert_eq!(left_subtree_size(5), 3);
        assert_eq!(left_subtree_size(6), 3);
        assert_eq!(left_subtree_size(7), 3);
        assert_eq!(left_subtree_size(8), 4);
    }

    #[test]
    #[should_panic(expected = "before balance")]
    fn test_query_before_balance_panics() {
        let map = random_map(10, 1);
        map.irradiance_estimate(DVec3::ZERO, DVec3::Z, 1.0, 4);
    }

    #[test]
    #[should_panic(expected = "after balance")]
    fn test_store_after_balance_panics() {
        let mut map = random_map(10, 1);
        map.balance();
        map.store(Color::ONE, DVec3::ZERO, DVec3::Z);
    }

    #[test]
    fn test_balance_keeps_every_photon() {
        let mut map = random_map(100, 2);
        let before = map.total_power();
        map.balance();
        assert_eq!(map.len(), 100);
        assert_eq!(map.photons().len(), 100);
        assert!((map.total_power() - before).length() < 1e-9);
    }

    #[test]
    fn test_heap_order_is_a_kd_tree() {
        let mut map = random_map(257, 3);
        map.balance();
        let heap = &map.photons;
        let stored = heap.len() - 1;

        fn check(
            heap: &[Photon],
            stored: usize,
            index: usize,
            axis: usize,
            split: f64,
            below: bool,
        ) {
            if index > stored {
                return;
            }
            let v = heap[index].position[axis];
            if below {
                assert!(v <= split);
            } else {
                assert!(v >= split);
            }
            check(heap, stored, 2 * index, axis, split, below);
            check(heap, stored, 2 * index + 1, axis, split, below);
        }

        for i in 1..=stored {
            let axis = heap[i].plane as usize;
            let split = heap[i].position[axis];
            check(heap, stored, 2 * i, axis, split, true);
            check(heap, stored, 2 * i + 1, axis, split, false);
        }
    }

    #[test]
    fn test_single_photon_estimate_is_finite() {
        let mut map = PhotonMap::new();
        map.store(Color::ONE, DVec3::ZERO, -DVec3::Z);
        map.balance();

        for radius in [0.0, 0.5, 10.0] {
            let e = map.irradiance_estimate(DVec3::ZERO, DVec3::Z, radius, 8);
            assert!(e.is_finite());
            assert!(e.min_element() >= 0.0);
        }
    }

    #[test]
    fn test_empty_map_estimate_is_zero() {
        let mut map = PhotonMap::new();
        map.balance();
        assert_eq!(map.irradiance_estimate(DVec3::ZERO, DVec3::Z, 1.0, 8), Color::ZERO);
    }

    #[test]
    fn test_estimate_matches_uniform_density() {
        // 10000 photons of power 1 uniformly over the unit square: irradiance 10000
        let mut map = random_map(10_000, 4);
        map.balance();

        let e = map.irradiance_estimate(DVec3::new(0.5, 0.5, 0.0), DVec3::Z, 0.2, 200);
        assert!((e.x - 10_000.0).abs() < 2_000.0, "estimate {e:?}");
    }

    #[test]
    fn test_estimate_ignores_back_facing_photons() {
        let mut map = random_map(1000, 5);
        map.balance();

        let e = map.irradiance_estimate(DVec3::new(0.5, 0.5, 0.0), -DVec3::Z, 0.2, 50);
        assert_eq!(e, Color::ZERO);
    }

    #[test]
    fn test_nearest_search_matches_brute_force() {
        let mut map = random_map(500, 6);
        map.balance();
        let photons = map.photons().to_vec();

        let query = DVec3::new(0.3, 0.7, 0.0);
        let k = 10;
        let mut dists: Vec<f64> = photons
            .iter()
            .map(|p| p.position.distance_squared(query))
            .collect();
        dists.sort_by(f64::total_cmp);
        let expected_r2 = dists[k - 1];

        // With k found, the normalisation radius is the k-th nearest distance
        let e = map.irradiance_estimate(query, DVec3::Z, 1.0, k);
        let expected = k as f64 * FRAC_1_PI / expected_r2;
        assert!((e.x - expected).abs() < 1e-6 * expected);
    }
}
