//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! The tree is built over any indexed collection that can report per-object
//! bounding boxes (see [`BvhSource`]) and stored as a flat node array: the
//! first child of interior node `i` is node `i + 1`, the second child is
//! `right`. Objects are split at the midpoint of the node's box along its
//! longest axis.

use crate::Ray;
use lux_math::Aabb;

/// An indexed collection of objects the BVH is built over.
pub trait BvhSource {
    /// Number of objects.
    fn object_count(&self) -> usize;

    /// Bounding box of object `index`.
    fn object_bounds(&self, index: usize) -> Aabb;
}

impl BvhSource for [Aabb] {
    fn object_count(&self) -> usize {
        self.len()
    }

    fn object_bounds(&self, index: usize) -> Aabb {
        self[index]
    }
}

/// Termination criteria for BVH construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvhConfig {
    /// Nodes at this depth become leaves
    pub max_depth: usize,
    /// Ranges with at most this many objects become leaves
    pub max_objects: usize,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_objects: 4,
        }
    }
}

/// Object indices held by a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafObjects {
    Empty,
    One(u32),
    Many(Box<[u32]>),
}

impl LeafObjects {
    fn from_slice(objects: &[u32]) -> Self {
        match objects {
            [] => LeafObjects::Empty,
            [one] => LeafObjects::One(*one),
            many => LeafObjects::Many(many.into()),
        }
    }

    pub fn as_slice(&self) -> &[u32] {
        match self {
            LeafObjects::Empty => &[],
            LeafObjects::One(index) => std::slice::from_ref(index),
            LeafObjects::Many(indices) => indices,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LeafObjects::Empty)
    }
}

/// A node of the flat BVH array.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    /// Internal node. Its first child is the next node in the array.
    Interior { bbox: Aabb, right: u32 },
    /// Leaf node with zero or more object indices.
    Leaf { bbox: Aabb, objects: LeafObjects },
}

impl BvhNode {
    pub fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Interior { bbox, .. } | BvhNode::Leaf { bbox, .. } => *bbox,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }
}

/// Statistics gathered while building a BVH.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    pub interior_nodes: usize,
    pub leaves: usize,
    pub sum_objects: usize,
    pub min_objects: usize,
    pub max_objects: usize,
    pub sum_depth: usize,
    pub min_depth: usize,
    pub max_depth: usize,
    /// Leaves holding 0, 1, 2, 3, 4 and more than 4 objects
    pub leaf_histogram: [usize; 6],
    /// Splits where the midpoint failed to separate the objects
    pub fallback_splits: usize,
}

impl Default for BuildStats {
    fn default() -> Self {
        Self {
            interior_nodes: 0,
            leaves: 0,
            sum_objects: 0,
            min_objects: usize::MAX,
            max_objects: 0,
            sum_depth: 0,
            min_depth: usize::MAX,
            max_depth: 0,
            leaf_histogram: [0; 6],
            fallback_splits: 0,
        }
    }
}

impl BuildStats {
    fn update_leaf(&mut self, depth: usize, n: usize) {
        self.leaves += 1;
        self.min_depth = self.min_depth.min(depth);
        self.max_depth = self.max_depth.max(depth);
        self.sum_depth += depth;
        self.min_objects = self.min_objects.min(n);
        self.max_objects = self.max_objects.max(n);
        self.sum_objects += n;
        self.leaf_histogram[n.min(5)] += 1;
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.interior_nodes + self.leaves
    }

    pub fn avg_objects(&self) -> f64 {
        if self.leaves == 0 {
            return 0.0;
        }
        self.sum_objects as f64 / self.leaves as f64
    }

    pub fn avg_depth(&self) -> f64 {
        if self.leaves == 0 {
            return 0.0;
        }
        self.sum_depth as f64 / self.leaves as f64
    }

    /// Log a summary at info level and the leaf histogram at debug level.
    pub fn log(&self) {
        log::info!(
            "BVH: {} nodes, {} leaves, objects/leaf {}/{:.2}/{}, depth {}/{:.2}/{} (min/avg/max)",
            self.node_count(),
            self.leaves,
            self.min_objects,
            self.avg_objects(),
            self.max_objects,
            self.min_depth,
            self.avg_depth(),
            self.max_depth
        );
        log::debug!(
            "BVH leaf histogram [0, 1, 2, 3, 4, 4+]: {:?}",
            self.leaf_histogram
        );
        if self.fallback_splits > 0 {
            log::warn!(
                "BVH: {} midpoint splits failed to separate objects, split by count instead",
                self.fallback_splits
            );
        }
    }
}

/// A flat bounding volume hierarchy over object indices.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
}

impl Bvh {
    /// Build a BVH over `source` and log its statistics.
    pub fn build<S: BvhSource + ?Sized>(source: &S, config: BvhConfig) -> Self {
        let (bvh, stats) = Self::build_with_stats(source, config);
        stats.log();
        bvh
    }

    /// Build a BVH over `source`, returning its statistics.
    pub fn build_with_stats<S: BvhSource + ?Sized>(
        source: &S,
        config: BvhConfig,
    ) -> (Self, BuildStats) {
        let count = source.object_count();
        let bounds: Vec<Aabb> = (0..count).map(|i| source.object_bounds(i)).collect();
        let mut objects: Vec<u32> = (0..count as u32).collect();

        let mut builder = Builder {
            bounds: &bounds,
            config,
            nodes: Vec::with_capacity(2 * count.max(1)),
            stats: BuildStats::default(),
        };

        if count > 1 {
            builder.nodes.push(placeholder());
            builder.build_branch(0, &mut objects, 0);
        } else {
            let root = builder.leaf(&objects, 0);
            builder.nodes.push(root);
        }

        let Builder { nodes, stats, .. } = builder;
        (Self { nodes }, stats)
    }

    /// The flat node array. Node 0 is the root.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Bounding box of everything in the tree.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, BvhNode::bbox)
    }

    /// Walk every leaf whose ancestors' boxes the ray overlaps and call
    /// `test(index, ray)` for each object in it.
    ///
    /// `test` returns true when it accepted a closer hit; it is expected to
    /// tighten `ray.t_max` so later boxes and objects are culled against the
    /// current closest hit. Returns true if any call accepted a hit.
    pub fn traverse<F>(&self, ray: &mut Ray, mut test: F) -> bool
    where
        F: FnMut(u32, &mut Ray) -> bool,
    {
        let mut hit_anything = false;
        let mut todo: Vec<usize> = Vec::with_capacity(64);
        let mut current = Some(0usize);

        while let Some(index) = current {
            match &self.nodes[index] {
                BvhNode::Leaf { objects, .. } => {
                    for &object in objects.as_slice() {
                        if test(object, ray) {
                            hit_anything = true;
                        }
                    }
                }
                BvhNode::Interior { bbox, right } => {
                    if bbox.hit(ray.origin, ray.direction, ray.interval()).is_some() {
                        todo.push(*right as usize);
                        current = Some(index + 1);
                        continue;
                    }
                }
            }
            current = todo.pop();
        }

        hit_anything
    }
}

struct Builder<'a> {
    bounds: &'a [Aabb],
    config: BvhConfig,
    nodes: Vec<BvhNode>,
    stats: BuildStats,
}

impl Builder<'_> {
    fn leaf(&mut self, objects: &[u32], depth: usize) -> BvhNode {
        self.stats.update_leaf(depth, objects.len());
        let bbox = objects.iter().fold(Aabb::EMPTY, |acc, &i| {
            Aabb::surrounding(&acc, &self.bounds[i as usize])
        });
        BvhNode::Leaf {
            bbox,
            objects: LeafObjects::from_slice(objects),
        }
    }

    /// Fill node `node_num` (already pushed) from `objects`.
    fn build_branch(&mut self, node_num: usize, objects: &mut [u32], depth: usize) {
        debug_assert_eq!(node_num, self.nodes.len() - 1);

        if objects.len() <= self.config.max_objects || depth == self.config.max_depth {
            self.nodes[node_num] = self.leaf(objects, depth);
            return;
        }

        let bbox = objects.iter().fold(Aabb::EMPTY, |acc, &i| {
            Aabb::surrounding(&acc, &self.bounds[i as usize])
        });
        let axis = bbox.longest_axis();
        let pivot = bbox.axis_interval(axis).center();
        let mid = self.split(objects, pivot, axis);

        self.stats.interior_nodes += 1;
        self.nodes[node_num] = BvhNode::Interior { bbox, right: 0 };

        let (below, above) = objects.split_at_mut(mid);

        // The array-adjacent child takes the upper half
        self.nodes.push(placeholder());
        self.build_branch(node_num + 1, above, depth + 1);

        let right = self.nodes.len();
        if let BvhNode::Interior { right: r, .. } = &mut self.nodes[node_num] {
            *r = right as u32;
        }
        self.nodes.push(placeholder());
        self.build_branch(right, below, depth + 1);
    }

    /// Partition `objects` so that those with centroids below `pivot` on
    /// `axis` come first. Returns the partition point, falling back to the
    /// middle of the range if one side would be empty.
    fn split(&mut self, objects: &mut [u32], pivot: f64, axis: usize) -> usize {
        let mut mid = 0;
        for i in 0..objects.len() {
            let centroid = self.bounds[objects[i] as usize].axis_interval(axis).center();
            if centroid < pivot {
                objects.swap(i, mid);
                mid += 1;
            }
        }

        if mid == 0 || mid == objects.len() {
            self.stats.fallback_splits += 1;
            mid = objects.len() / 2;
        }
        mid
    }
}

fn placeholder() -> BvhNode {
    BvhNode::Leaf {
        bbox: Aabb::EMPTY,
        objects: LeafObjects::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lux_math::DVec3;

    fn unit_boxes(centers: &[DVec3]) -> Vec<Aabb> {
        centers
            .iter()
            .map(|&c| Aabb::from_points(c - DVec3::splat(0.25), c + DVec3::splat(0.25)))
            .collect()
    }

    fn leaf_objects(bvh: &Bvh) -> Vec<u32> {
        let mut all: Vec<u32> = bvh
            .nodes()
            .iter()
            .filter_map(|n| match n {
                BvhNode::Leaf { objects, .. } => Some(objects.as_slice().to_vec()),
                _ => None,
            })
            .flatten()
            .collect();
        all.sort_unstable();
        all
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = Bvh::build(&[][..], BvhConfig::default());
        assert_eq!(bvh.nodes().len(), 1);
        assert!(matches!(
            bvh.nodes()[0],
            BvhNode::Leaf {
                objects: LeafObjects::Empty,
                ..
            }
        ));

        let mut ray = Ray::new(DVec3::ZERO, DVec3::X);
        assert!(!bvh.traverse(&mut ray, |_, _| true));
    }

    #[test]
    fn test_bvh_single_object() {
        let boxes = unit_boxes(&[DVec3::ZERO]);
        let bvh = Bvh::build(boxes.as_slice(), BvhConfig::default());
        assert_eq!(bvh.nodes().len(), 1);
        assert_eq!(
            bvh.nodes()[0],
            BvhNode::Leaf {
                bbox: boxes[0],
                objects: LeafObjects::One(0)
            }
        );
    }

    #[test]
    fn test_bvh_layout_invariants() {
        let centers: Vec<DVec3> = (0..37)
            .map(|i| DVec3::new(i as f64, (i * 7 % 5) as f64, (i * 3 % 11) as f64))
            .collect();
        let boxes = unit_boxes(&centers);

        for max_objects in [1, 2, 4, 8] {
            let config = BvhConfig {
                max_depth: 32,
                max_objects,
            };
            let (bvh, stats) = Bvh::build_with_stats(boxes.as_slice(), config);

            // Every object lands in exactly one leaf
            assert_eq!(leaf_objects(&bvh), (0..37).collect::<Vec<u32>>());
            assert_eq!(stats.node_count(), bvh.nodes().len());
            assert_eq!(stats.sum_objects, 37);
            assert!(stats.max_objects <= max_objects);

            for (i, node) in bvh.nodes().iter().enumerate() {
                if let BvhNode::Interior { right, .. } = node {
                    assert!(*right as usize > i + 1);
                    assert!((*right as usize) < bvh.nodes().len());
                }
            }
        }
    }

    #[test]
    fn test_bvh_max_depth_zero_is_one_leaf() {
        let boxes = unit_boxes(&[DVec3::ZERO, DVec3::X * 4.0, DVec3::Y * 4.0]);
        let config = BvhConfig {
            max_depth: 0,
            max_objects: 1,
        };
        let bvh = Bvh::build(boxes.as_slice(), config);
        assert_eq!(bvh.nodes().len(), 1);
        let all = Aabb::surrounding(&Aabb::surrounding(&boxes[0], &boxes[1]), &boxes[2]);
        assert_eq!(bvh.nodes()[0].bbox(), all);
    }

    #[test]
    fn test_bvh_coincident_objects_fall_back() {
        // Identical boxes cannot be separated at the midpoint
        let boxes = unit_boxes(&[DVec3::ONE; 8]);
        let config = BvhConfig {
            max_depth: 32,
            max_objects: 1,
        };
        let (bvh, stats) = Bvh::build_with_stats(boxes.as_slice(), config);
        assert!(stats.fallback_splits > 0);
        assert_eq!(leaf_objects(&bvh).len(), 8);
        assert_eq!(stats.leaf_histogram[1], 8);
    }

    #[test]
    fn test_bvh_traversal_culls_by_box() {
        let centers: Vec<DVec3> = (0..16).map(|i| DVec3::new(i as f64 * 2.0, 0.0, 0.0)).collect();
        let boxes = unit_boxes(&centers);
        let config = BvhConfig {
            max_depth: 32,
            max_objects: 1,
        };
        let bvh = Bvh::build(boxes.as_slice(), config);

        // A ray along +Y through x = 10 only reaches the leaves next to object 5
        let mut ray = Ray::new(DVec3::new(10.0, -5.0, 0.0), DVec3::Y);
        let mut visited = Vec::new();
        bvh.traverse(&mut ray, |i, _| {
            visited.push(i);
            false
        });
        assert!(visited.contains(&5));
        assert!(visited.len() <= 2, "visited {visited:?}");
    }
}
