// THEORY:
// The `spot` module holds the data containers of the spatial analysis layer,
// plus the area filter and centroid extractor that turn raw labeled components
// into reportable spots. A `Spot` represents a single connected foreground
// region that survived the size filter, summarized by its bounding box, its
// pixel membership, and a centroid.
//
// Key architectural principles:
// 1.  **Dumb Data Containers**: `Point`, `BoundingBox`, `Component` and `Spot`
//     carry data and cheap derived measurements. They hold no references into
//     the mask or channel they came from, so callers can keep them around
//     after the source buffers are gone.
// 2.  **Two Centroid Modes**: The centroid is either the integer midpoint of
//     the bounding box (cheap, fine for counting) or the mean of all member
//     pixel coordinates (precise, preferred when the position itself is the
//     output). `CentroidMode` makes the choice explicit per configuration.
// 3.  **Caller-Space Coordinates**: Detection runs on a cropped region, but
//     everything reported to the caller is translated back into the original
//     image's coordinate space via `translate`.

/// A 2D pixel coordinate. `x` is the column, `y` is the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// The minimal axis-aligned rectangle containing a set of pixels, stored as
/// inclusive top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// A degenerate box containing a single pixel.
    pub fn from_point(point: Point) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Expands the box, if necessary, to contain `point`.
    pub fn include(&mut self, point: Point) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    pub fn width(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    /// The integer midpoint of the box, `(min + max + 1) / 2` per axis.
    /// Equivalent to the floor midpoint of the half-open pixel range
    /// `[min, max + 1)`.
    pub fn midpoint(&self) -> (f64, f64) {
        let mid_x = (self.min.x + self.max.x + 1) / 2;
        let mid_y = (self.min.y + self.max.y + 1) / 2;
        (mid_x as f64, mid_y as f64)
    }

    /// The number of empty pixel columns and rows strictly between two boxes,
    /// per axis. An axis where the intervals overlap or touch has gap 0.
    pub fn gap_to(&self, other: &BoundingBox) -> (u32, u32) {
        let gap_x = axis_gap(self.min.x, self.max.x, other.min.x, other.max.x);
        let gap_y = axis_gap(self.min.y, self.max.y, other.min.y, other.max.y);
        (gap_x, gap_y)
    }

    /// Shifts both corners by a non-negative offset.
    pub fn translate(&mut self, dx: u32, dy: u32) {
        self.min.x += dx;
        self.min.y += dy;
        self.max.x += dx;
        self.max.y += dy;
    }
}

/// Gap between two inclusive 1D intervals: the count of integers strictly
/// between them, 0 when they overlap or touch.
fn axis_gap(a_min: u32, a_max: u32, b_min: u32, b_max: u32) -> u32 {
    if b_min > a_max {
        b_min - a_max - 1
    } else if a_min > b_max {
        a_min - b_max - 1
    } else {
        0
    }
}

/// A connected region of foreground pixels found by the labeler, before any
/// size filtering has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Sequential 1-based label, assigned in scan order of the first pixel.
    pub label: u32,
    /// The minimal rectangle containing every pixel of the component.
    pub bounding_box: BoundingBox,
    /// Every pixel coordinate belonging to the component.
    pub pixel_coords: Vec<Point>,
}

impl Component {
    /// The pixel count of the component.
    pub fn area(&self) -> usize {
        self.pixel_coords.len()
    }
}

/// How a spot's centroid is derived from its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CentroidMode {
    /// Integer midpoint of the bounding box. Cheap, and the historical
    /// behavior of this analysis.
    #[default]
    BoundingBoxMidpoint,
    /// Mean of all member pixel coordinates. Slower, positionally exact.
    PixelMean,
}

/// A component that passed the area filter, with its centroid attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    /// The label of the component this spot came from.
    pub label: u32,
    /// The minimal rectangle containing every pixel of the spot.
    pub bounding_box: BoundingBox,
    /// Every pixel coordinate belonging to the spot.
    pub pixel_coords: Vec<Point>,
    /// The pixel count of the spot.
    pub area: usize,
    /// The spot's representative position, `(x, y)`.
    pub centroid: (f64, f64),
}

impl Spot {
    fn from_component(component: Component, mode: CentroidMode) -> Self {
        let centroid = match mode {
            CentroidMode::BoundingBoxMidpoint => component.bounding_box.midpoint(),
            CentroidMode::PixelMean => pixel_mean(&component.pixel_coords),
        };
        let area = component.area();
        Self {
            label: component.label,
            bounding_box: component.bounding_box,
            pixel_coords: component.pixel_coords,
            area,
            centroid,
        }
    }

    /// Shifts the spot's coordinates by a non-negative offset. Used to report
    /// results in the original image space after detecting on a cropped
    /// region.
    pub fn translate(&mut self, dx: u32, dy: u32) {
        self.bounding_box.translate(dx, dy);
        for point in &mut self.pixel_coords {
            point.x += dx;
            point.y += dy;
        }
        self.centroid.0 += dx as f64;
        self.centroid.1 += dy as f64;
    }
}

/// Retains the components whose area lies within `[min_area, max_area]`
/// (inclusive on both ends) and attaches a centroid to each survivor.
/// Bound validity (`min_area <= max_area`) is the configuration layer's
/// responsibility.
pub fn filter_spots(
    components: Vec<Component>,
    min_area: usize,
    max_area: usize,
    mode: CentroidMode,
) -> Vec<Spot> {
    debug_assert!(min_area <= max_area);
    components
        .into_iter()
        .filter(|component| {
            let area = component.area();
            min_area <= area && area <= max_area
        })
        .map(|component| Spot::from_component(component, mode))
        .collect()
}

fn pixel_mean(pixels: &[Point]) -> (f64, f64) {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for point in pixels {
        sum_x += point.x as f64;
        sum_y += point.y as f64;
    }
    let count = pixels.len() as f64;
    (sum_x / count, sum_y / count)
}
