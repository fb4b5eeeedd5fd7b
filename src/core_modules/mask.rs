// THEORY:
// The `mask` module performs the binary classification step: every pixel of a
// channel is marked foreground or background by comparing it against a scalar
// threshold. Dark material on a bright background thresholds with `Below`;
// bright material on a dark background with `Above`. Both comparisons are
// strict, so a pixel exactly at the threshold is always background.
//
// The `Mask` itself is a flat row-major boolean buffer with its dimensions
// attached. Its shape always equals the shape of the channel it was built
// from; that agreement is an internal contract, asserted rather than
// propagated as an error.

use image::GrayImage;

/// Which side of the threshold counts as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdDirection {
    /// Pixels strictly below the threshold are foreground (dark spots on a
    /// bright background).
    #[default]
    Below,
    /// Pixels strictly above the threshold are foreground.
    Above,
}

/// A boolean foreground/background classification of a channel's pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    data: Vec<bool>,
}

impl Mask {
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        assert!(x < self.width && y < self.height);
        self.data[(y * self.width + x) as usize]
    }

    /// Total number of foreground pixels.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&set| set).count()
    }
}

/// Classifies every pixel of `channel` against `threshold`, producing a mask
/// of the same shape.
pub fn build_mask(channel: &GrayImage, threshold: u8, direction: ThresholdDirection) -> Mask {
    let (width, height) = channel.dimensions();
    let mut data = Vec::with_capacity((width * height) as usize);
    for pixel in channel.pixels() {
        let value = pixel.0[0];
        let foreground = match direction {
            ThresholdDirection::Below => value < threshold,
            ThresholdDirection::Above => value > threshold,
        };
        data.push(foreground);
    }
    assert_eq!(data.len(), (width * height) as usize);
    Mask {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient_channel() -> GrayImage {
        // 4x1 channel with values 0, 100, 135, 255.
        let mut channel = GrayImage::new(4, 1);
        for (x, value) in [0u8, 100, 135, 255].into_iter().enumerate() {
            channel.put_pixel(x as u32, 0, Luma([value]));
        }
        channel
    }

    #[test]
    fn below_marks_strictly_darker_pixels() {
        let mask = build_mask(&gradient_channel(), 135, ThresholdDirection::Below);
        assert!(mask.is_foreground(0, 0));
        assert!(mask.is_foreground(1, 0));
        // Exactly at the threshold is background.
        assert!(!mask.is_foreground(2, 0));
        assert!(!mask.is_foreground(3, 0));
        assert_eq!(mask.foreground_count(), 2);
    }

    #[test]
    fn above_marks_strictly_brighter_pixels() {
        let mask = build_mask(&gradient_channel(), 135, ThresholdDirection::Above);
        assert!(!mask.is_foreground(0, 0));
        assert!(!mask.is_foreground(2, 0));
        assert!(mask.is_foreground(3, 0));
        assert_eq!(mask.foreground_count(), 1);
    }

    #[test]
    fn mask_shape_matches_channel() {
        let channel = GrayImage::new(6, 9);
        let mask = build_mask(&channel, 10, ThresholdDirection::Below);
        assert_eq!((mask.width, mask.height), (6, 9));
    }

    #[test]
    fn uniform_channel_below_its_value_is_all_background() {
        let channel = GrayImage::from_pixel(5, 5, Luma([200]));
        let mask = build_mask(&channel, 100, ThresholdDirection::Below);
        assert_eq!(mask.foreground_count(), 0);
    }
}
