// THEORY:
// The `grouping` module is the engine of the clustering layer. It partitions
// detected spots into groups: a group is a maximal set of spots that are
// mutually reachable through the proximity predicate.
//
// Algorithm steps:
// 1.  **Proximity Graph**: Conceptually, an edge connects any two spots that
//     satisfy the proximity rule. Every pair is evaluated, an O(n^2) sweep
//     that stays cheap for the few thousand spots a region produces.
// 2.  **Transitive Closure**: Groups are the connected components of that
//     graph, computed with a union-find structure. The closure matters: when
//     spot C is close to both A and B but A and B are not close to each
//     other, all three belong to one group. A greedy visited-set sweep gets
//     this wrong and splits the group depending on input order; union-find
//     makes membership independent of iteration order.
// 3.  **Aggregation**: Each group is summarized by a representative center
//     (the mean of member centroids) and radius. In precise mode the radius
//     reaches to the farthest member pixel; in fast mode to the farthest
//     member centroid.
//
// Groups are emitted ordered by their lowest member index, and member lists
// preserve the input spot order, so the output is deterministic for a given
// input sequence even though membership itself is order-independent.

use crate::core_modules::spot::{CentroidMode, Spot};

/// The proximity rule deciding whether two spots belong together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupingRule {
    /// Two spots are proximate when the Euclidean distance between their
    /// centroids is at most `group_diameter / 2`.
    CentroidDistance { group_diameter: f64 },
    /// Two spots are proximate when, on both axes, the count of empty pixel
    /// rows/columns strictly between their bounding boxes is at most
    /// `padding`.
    BoundingBoxGap { padding: u32 },
}

/// A maximal cluster of spots under the proximity rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotGroup {
    /// Indices into the spot slice this group was computed from.
    pub spot_indices: Vec<usize>,
    /// Mean of the member centroids, `(x, y)`.
    pub center: (f64, f64),
    /// Maximum distance from the center to a member pixel (precise mode) or
    /// to a member centroid (fast mode).
    pub radius: f64,
}

impl SpotGroup {
    /// Shifts the group center by a non-negative offset. Used alongside
    /// `Spot::translate` when reporting results in the original image space.
    pub fn translate(&mut self, dx: u32, dy: u32) {
        self.center.0 += dx as f64;
        self.center.1 += dy as f64;
    }
}

/// Partitions `spots` into groups. Every spot lands in exactly one group, and
/// group membership does not depend on the order of the input slice.
pub fn group_spots(spots: &[Spot], rule: GroupingRule, mode: CentroidMode) -> Vec<SpotGroup> {
    let mut forest = DisjointSet::new(spots.len());
    for i in 0..spots.len() {
        for j in i + 1..spots.len() {
            if spots_proximate(&spots[i], &spots[j], rule) {
                forest.union(i, j);
            }
        }
    }

    // Collect members per root, groups ordered by lowest member index.
    let mut group_of_root: Vec<Option<usize>> = vec![None; spots.len()];
    let mut members: Vec<Vec<usize>> = Vec::new();
    for index in 0..spots.len() {
        let root = forest.find(index);
        match group_of_root[root] {
            Some(group_index) => members[group_index].push(index),
            None => {
                group_of_root[root] = Some(members.len());
                members.push(vec![index]);
            }
        }
    }

    members
        .into_iter()
        .map(|spot_indices| summarize_group(spots, spot_indices, mode))
        .collect()
}

fn spots_proximate(a: &Spot, b: &Spot, rule: GroupingRule) -> bool {
    match rule {
        GroupingRule::CentroidDistance { group_diameter } => {
            distance(a.centroid, b.centroid) <= group_diameter / 2.0
        }
        GroupingRule::BoundingBoxGap { padding } => {
            let (gap_x, gap_y) = a.bounding_box.gap_to(&b.bounding_box);
            gap_x <= padding && gap_y <= padding
        }
    }
}

fn summarize_group(spots: &[Spot], spot_indices: Vec<usize>, mode: CentroidMode) -> SpotGroup {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for &index in &spot_indices {
        sum_x += spots[index].centroid.0;
        sum_y += spots[index].centroid.1;
    }
    let count = spot_indices.len() as f64;
    let center = (sum_x / count, sum_y / count);

    let mut radius: f64 = 0.0;
    for &index in &spot_indices {
        let spot = &spots[index];
        match mode {
            CentroidMode::BoundingBoxMidpoint => {
                radius = radius.max(distance(center, spot.centroid));
            }
            CentroidMode::PixelMean => {
                for point in &spot.pixel_coords {
                    radius = radius.max(distance(center, (point.x as f64, point.y as f64)));
                }
            }
        }
    }

    SpotGroup {
        spot_indices,
        center,
        radius,
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Union-find forest with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(count: usize) -> Self {
        Self {
            parent: (0..count).collect(),
            size: vec![1; count],
        }
    }

    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    fn union(&mut self, a: usize, b: usize) {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
    }
}
