// THEORY:
// The `channel` module is the entry gate of the pipeline. Detection operates
// on a single 8-bit intensity plane, so the first step for color input is to
// collapse RGB into one channel. Which channel matters: stained material that
// is nearly invisible in luminance can be high-contrast in a single color
// plane, so the selector is a tunable rather than a hardcoded choice.
//
// The five extractions:
// - Red / Green / Blue: the raw color plane, copied through.
// - Violet: the per-pixel average of red and blue, truncated to 8 bits.
// - Luminance: the Rec. 601 weighting 0.299R + 0.587G + 0.114B, computed in
//   f64 and truncated to 8 bits. The weights are load-bearing: results must
//   reproduce across runs and match the standard grayscale conversion.

use image::{GrayImage, Luma, RgbImage};

/// Selects which intensity plane is derived from an RGB raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSelector {
    Red,
    Green,
    Blue,
    /// Average of the red and blue planes.
    Violet,
    /// Rec. 601 luma (standard grayscale conversion).
    #[default]
    Luminance,
}

/// Derives a single-channel analysis image from an RGB raster. The output has
/// the same dimensions as the input.
pub fn extract_channel(raster: &RgbImage, selector: ChannelSelector) -> GrayImage {
    let (width, height) = raster.dimensions();
    let mut channel = GrayImage::new(width, height);
    for (x, y, pixel) in raster.enumerate_pixels() {
        let [red, green, blue] = pixel.0;
        let value = match selector {
            ChannelSelector::Red => red,
            ChannelSelector::Green => green,
            ChannelSelector::Blue => blue,
            ChannelSelector::Violet => ((red as u16 + blue as u16) / 2) as u8,
            ChannelSelector::Luminance => {
                (0.299_f64 * red as f64 + 0.587_f64 * green as f64 + 0.114_f64 * blue as f64) as u8
            }
        };
        channel.put_pixel(x, y, Luma([value]));
    }
    channel
}
