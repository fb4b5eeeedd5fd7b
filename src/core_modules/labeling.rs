// THEORY:
// The `labeling` module is the engine of the detection layer. It implements
// plain binary connected-component labeling over a mask: every maximal set of
// mutually adjacent foreground pixels becomes one `Component`.
//
// Algorithm steps:
// 1.  **Seed Scan**: The mask is scanned in row-major order. Every foreground
//     pixel that has not yet been claimed by a component starts a new one, so
//     components come out ordered by their first-encountered pixel and labels
//     are assigned sequentially from 1.
// 2.  **Region Growing**: From each seed, the component is grown with an
//     explicit stack, claiming every adjacent unvisited foreground pixel. A
//     `visited` buffer guarantees each pixel is claimed exactly once, which
//     makes the output a partition of the foreground: the component areas
//     always sum to the mask's total foreground count.
// 3.  **Adjacency**: Which neighbors count as adjacent is the `Connectivity`
//     knob. `Four` connects only horizontal and vertical neighbors; `Eight`
//     also connects diagonals, merging regions that touch corner-to-corner.
// 4.  **Data Aggregation**: While growing, the bounding box is expanded and
//     the pixel list collected, so a finished `Component` carries everything
//     the downstream filter and grouper need.

use crate::core_modules::mask::Mask;
use crate::core_modules::spot::{BoundingBox, Component, Point};

/// Which neighboring pixels count as adjacent during labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Horizontal and vertical neighbors only.
    Four,
    /// Horizontal, vertical and diagonal neighbors.
    #[default]
    Eight,
}

pub mod labeling {
    use super::*;

    const FOUR_NEIGHBORS: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
    const EIGHT_NEIGHBORS: [(i64, i64); 8] = [
        (0, 1),
        (0, -1),
        (1, 0),
        (-1, 0),
        (1, 1),
        (1, -1),
        (-1, 1),
        (-1, -1),
    ];

    /// Finds every connected component of foreground pixels in the mask.
    /// An all-background mask yields an empty vector.
    pub fn find_components(mask: &Mask, connectivity: Connectivity) -> Vec<Component> {
        let width = mask.width;
        let height = mask.height;
        let mut visited = vec![false; (width * height) as usize];
        let mut components: Vec<Component> = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || !mask.is_foreground(x, y) {
                    continue;
                }
                let label = components.len() as u32 + 1;
                let component =
                    grow_component(Point { x, y }, label, mask, &mut visited, connectivity);
                components.push(component);
            }
        }

        components
    }

    /// Grows a single component from `seed`, claiming every reachable
    /// foreground pixel via an explicit stack.
    fn grow_component(
        seed: Point,
        label: u32,
        mask: &Mask,
        visited: &mut [bool],
        connectivity: Connectivity,
    ) -> Component {
        let neighbors: &[(i64, i64)] = match connectivity {
            Connectivity::Four => &FOUR_NEIGHBORS,
            Connectivity::Eight => &EIGHT_NEIGHBORS,
        };

        let mut pixel_coords: Vec<Point> = Vec::new();
        let mut bounding_box = BoundingBox::from_point(seed);
        let mut stack: Vec<Point> = vec![seed];
        visited[(seed.y * mask.width + seed.x) as usize] = true;

        while let Some(current) = stack.pop() {
            bounding_box.include(current);
            pixel_coords.push(current);

            for (dx, dy) in neighbors {
                let nx = current.x as i64 + dx;
                let ny = current.y as i64 + dy;
                if nx < 0 || nx >= mask.width as i64 || ny < 0 || ny >= mask.height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                let neighbor_index = (ny * mask.width + nx) as usize;
                if !visited[neighbor_index] && mask.is_foreground(nx, ny) {
                    visited[neighbor_index] = true;
                    stack.push(Point { x: nx, y: ny });
                }
            }
        }

        Component {
            label,
            bounding_box,
            pixel_coords,
        }
    }
}
