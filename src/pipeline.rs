// THEORY:
// The `pipeline` module is the top-level API for the detection engine. It
// encapsulates the full chain (channel extraction, thresholding, component
// labeling, area filtering, centroid extraction, grouping) behind a single
// validated configuration, plus the sequential threshold search that sweeps
// the chain across candidate thresholds.
//
// Design rules the module enforces:
// 1.  **Validate Once, Up Front**: `SpotPipeline::new` rejects inconsistent
//     configuration (inverted area bounds) before any pixels are touched, and
//     the scan range and analysis region are checked the same way at their
//     points of use. Nothing is silently clamped.
// 2.  **Pure Calls**: Every analysis call is a deterministic function of its
//     inputs. The pipeline holds only its configuration; no result of one
//     call influences the next. The last-used threshold is the caller's state
//     to keep, not ours.
// 3.  **Caller-Space Output**: When an analysis region is configured,
//     detection runs on the cropped sub-image and all reported coordinates
//     are translated back into the full image's space.

use crate::core_modules::channel::extract_channel;
use crate::core_modules::grouping::group_spots;
use crate::core_modules::labeling::labeling;
use crate::core_modules::mask::build_mask;
use crate::core_modules::spot::filter_spots;
use image::{GrayImage, RgbImage, imageops::crop_imm};
use log::debug;
use thiserror::Error;

// Re-export the configuration and result vocabulary for the public API.
pub use crate::core_modules::channel::ChannelSelector;
pub use crate::core_modules::grouping::{GroupingRule, SpotGroup};
pub use crate::core_modules::labeling::Connectivity;
pub use crate::core_modules::mask::ThresholdDirection;
pub use crate::core_modules::spot::{CentroidMode, Spot};

/// A rectangular analysis region within the input image, in pixel
/// coordinates. Detection runs only on this sub-rectangle and results are
/// reported in full-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The candidate thresholds swept by the threshold search: `start`,
/// `start + step`, ... up to and including `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub start: u8,
    pub stop: u8,
    pub step: u8,
}

impl Default for ScanRange {
    /// Every 5 intensity units across [10, 245], the historical scan.
    fn default() -> Self {
        Self {
            start: 10,
            stop: 245,
            step: 5,
        }
    }
}

impl ScanRange {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::ZeroScanStep);
        }
        if self.start > self.stop {
            return Err(ConfigError::EmptyScanRange {
                start: self.start,
                stop: self.stop,
            });
        }
        Ok(())
    }

    /// The candidate thresholds in ascending order. A validated range always
    /// yields at least one candidate. Calling this with a zero step is a
    /// contract violation and panics.
    pub fn candidates(&self) -> impl Iterator<Item = u8> + use<> {
        (self.start..=self.stop).step_by(self.step as usize)
    }
}

/// Configuration rejected before any processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("minimum spot area {min_area} exceeds maximum spot area {max_area}")]
    AreaBoundsInverted { min_area: usize, max_area: usize },
    #[error("scan range is empty: start {start} exceeds stop {stop}")]
    EmptyScanRange { start: u8, stop: u8 },
    #[error("scan step must be non-zero")]
    ZeroScanStep,
    #[error("analysis region {region:?} exceeds the {width}x{height} image")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
}

/// Configuration for the full detection chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotPipelineConfig {
    /// Which intensity plane to derive from RGB input.
    pub channel: ChannelSelector,
    /// The intensity cut point for the mask.
    pub threshold: u8,
    /// Which side of the threshold is foreground.
    pub direction: ThresholdDirection,
    /// Adjacency rule for component labeling.
    pub connectivity: Connectivity,
    /// Smallest pixel area a component may have to count as a spot
    /// (inclusive).
    pub min_area: usize,
    /// Largest pixel area a component may have to count as a spot
    /// (inclusive).
    pub max_area: usize,
    /// How spot centroids (and group radii) are derived.
    pub centroid_mode: CentroidMode,
    /// The proximity rule clustering spots into groups.
    pub grouping: GroupingRule,
    /// Optional sub-rectangle to restrict the analysis to. `None` analyzes
    /// the full image.
    pub region: Option<Region>,
}

impl Default for SpotPipelineConfig {
    fn default() -> Self {
        Self {
            channel: ChannelSelector::Luminance,
            threshold: 135,
            direction: ThresholdDirection::Below,
            connectivity: Connectivity::Eight,
            min_area: 30,
            max_area: 250,
            centroid_mode: CentroidMode::BoundingBoxMidpoint,
            grouping: GroupingRule::CentroidDistance {
                group_diameter: 60.0,
            },
            region: None,
        }
    }
}

impl SpotPipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_area > self.max_area {
            return Err(ConfigError::AreaBoundsInverted {
                min_area: self.min_area,
                max_area: self.max_area,
            });
        }
        Ok(())
    }
}

/// The result of one analysis call: all spots that passed the area filter and
/// their partition into groups. `SpotGroup::spot_indices` index into `spots`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotAnalysis {
    pub spots: Vec<Spot>,
    pub groups: Vec<SpotGroup>,
}

/// A threshold candidate together with the number of groups it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdResult {
    pub threshold: u8,
    pub group_count: usize,
}

/// The main, top-level struct for the detection engine.
#[derive(Debug)]
pub struct SpotPipeline {
    config: SpotPipelineConfig,
}

impl SpotPipeline {
    /// Validates the configuration and builds a pipeline. Fails fast on
    /// inconsistent area bounds.
    pub fn new(config: SpotPipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SpotPipelineConfig {
        &self.config
    }

    /// Runs the full chain on an RGB raster: channel extraction, then the
    /// single-channel analysis.
    pub fn analyze_image(&self, raster: &RgbImage) -> Result<SpotAnalysis, ConfigError> {
        let channel = extract_channel(raster, self.config.channel);
        self.analyze_channel(&channel)
    }

    /// Runs mask building, component labeling, area filtering and grouping on
    /// a single-channel image at the configured threshold. Reported
    /// coordinates are in the full image's space even when an analysis region
    /// is configured.
    pub fn analyze_channel(&self, channel: &GrayImage) -> Result<SpotAnalysis, ConfigError> {
        let cropped = self.cropped_channel(channel)?;
        let view = cropped.as_ref().unwrap_or(channel);
        let (mut spots, mut groups) = self.detect(view, self.config.threshold);
        if let Some(region) = self.config.region {
            for spot in &mut spots {
                spot.translate(region.x, region.y);
            }
            for group in &mut groups {
                group.translate(region.x, region.y);
            }
        }
        Ok(SpotAnalysis { spots, groups })
    }

    /// Sweeps the scan range in ascending order and returns the threshold
    /// that maximized the number of detected groups. Only a strict
    /// improvement replaces the incumbent, so ties resolve to the first
    /// (lowest) threshold. An image with no groups at any candidate yields
    /// the first candidate with count 0; that is a valid degenerate result,
    /// not an error.
    pub fn find_best_threshold(
        &self,
        channel: &GrayImage,
        scan: &ScanRange,
    ) -> Result<ThresholdResult, ConfigError> {
        scan.validate()?;
        let cropped = self.cropped_channel(channel)?;
        let view = cropped.as_ref().unwrap_or(channel);

        let mut best: Option<ThresholdResult> = None;
        for threshold in scan.candidates() {
            let group_count = self.detect(view, threshold).1.len();
            debug!("scan threshold {threshold}: {group_count} groups");
            let improved = match &best {
                None => true,
                Some(incumbent) => group_count > incumbent.group_count,
            };
            if improved {
                best = Some(ThresholdResult {
                    threshold,
                    group_count,
                });
            }
        }

        // A validated range always produced at least one candidate.
        Ok(best.unwrap_or(ThresholdResult {
            threshold: scan.start,
            group_count: 0,
        }))
    }

    /// One pass of the chain on an already-cropped channel view.
    fn detect(&self, view: &GrayImage, threshold: u8) -> (Vec<Spot>, Vec<SpotGroup>) {
        let mask = build_mask(view, threshold, self.config.direction);
        let components = labeling::find_components(&mask, self.config.connectivity);
        let spots = filter_spots(
            components,
            self.config.min_area,
            self.config.max_area,
            self.config.centroid_mode,
        );
        let groups = group_spots(&spots, self.config.grouping, self.config.centroid_mode);
        debug!(
            "threshold {threshold}: {} foreground px, {} spots, {} groups",
            mask.foreground_count(),
            spots.len(),
            groups.len()
        );
        (spots, groups)
    }

    /// Scores a single candidate threshold on an already-cropped channel.
    /// Shared with the parallel search driver.
    pub(crate) fn group_count_at(&self, view: &GrayImage, threshold: u8) -> usize {
        self.detect(view, threshold).1.len()
    }

    /// Extracts the configured analysis region, validating it against the
    /// channel bounds. `None` means no region is configured and the full
    /// channel should be used as-is.
    pub(crate) fn cropped_channel(
        &self,
        channel: &GrayImage,
    ) -> Result<Option<GrayImage>, ConfigError> {
        let Some(region) = self.config.region else {
            return Ok(None);
        };
        let (width, height) = channel.dimensions();
        let fits_x = region.x as u64 + region.width as u64 <= width as u64;
        let fits_y = region.y as u64 + region.height as u64 <= height as u64;
        if !fits_x || !fits_y {
            return Err(ConfigError::RegionOutOfBounds {
                region,
                width,
                height,
            });
        }
        Ok(Some(
            crop_imm(channel, region.x, region.y, region.width, region.height).to_image(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    /// A uniform channel with square blocks of a given value painted on.
    fn channel_with_blocks(
        width: u32,
        height: u32,
        background: u8,
        blocks: &[(u32, u32, u32, u8)], // (x, y, side, value)
    ) -> GrayImage {
        let mut channel = GrayImage::from_pixel(width, height, Luma([background]));
        for &(x0, y0, side, value) in blocks {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    channel.put_pixel(x, y, Luma([value]));
                }
            }
        }
        channel
    }

    fn three_block_config(group_diameter: f64) -> SpotPipelineConfig {
        SpotPipelineConfig {
            threshold: 100,
            min_area: 20,
            max_area: 30,
            grouping: GroupingRule::CentroidDistance { group_diameter },
            ..SpotPipelineConfig::default()
        }
    }

    #[test]
    fn three_separated_blocks_are_three_spots() {
        let channel = channel_with_blocks(
            100,
            100,
            200,
            &[(10, 10, 5, 0), (40, 10, 5, 0), (10, 40, 5, 0)],
        );

        // Blocks are ~30 px apart, well beyond a diameter of 10.
        let pipeline = SpotPipeline::new(three_block_config(10.0)).expect("valid config");
        let analysis = pipeline.analyze_channel(&channel).expect("analysis");
        assert_eq!(analysis.spots.len(), 3);
        assert_eq!(analysis.groups.len(), 3);

        // A huge diameter collapses everything into one group.
        let pipeline = SpotPipeline::new(three_block_config(1000.0)).expect("valid config");
        let analysis = pipeline.analyze_channel(&channel).expect("analysis");
        assert_eq!(analysis.spots.len(), 3);
        assert_eq!(analysis.groups.len(), 1);
    }

    #[test]
    fn uniform_background_is_a_degenerate_result_not_an_error() {
        let channel = GrayImage::from_pixel(50, 50, Luma([200]));
        let pipeline = SpotPipeline::new(three_block_config(10.0)).expect("valid config");
        let analysis = pipeline.analyze_channel(&channel).expect("analysis");
        assert!(analysis.spots.is_empty());
        assert!(analysis.groups.is_empty());
    }

    #[test]
    fn analysis_is_idempotent() {
        let channel = channel_with_blocks(80, 80, 200, &[(5, 5, 5, 0), (30, 30, 5, 0)]);
        let pipeline = SpotPipeline::new(three_block_config(60.0)).expect("valid config");
        let first = pipeline.analyze_channel(&channel).expect("analysis");
        let second = pipeline.analyze_channel(&channel).expect("analysis");
        assert_eq!(first, second);
    }

    #[test]
    fn search_picks_first_threshold_with_maximal_group_count() {
        // Three dark blocks (value 40) and two medium blocks (value 120) on
        // a bright background. Candidates above 40 see three groups,
        // candidates above 120 see five.
        let channel = channel_with_blocks(
            200,
            200,
            200,
            &[
                (10, 10, 5, 40),
                (60, 10, 5, 40),
                (10, 60, 5, 40),
                (120, 120, 5, 120),
                (170, 120, 5, 120),
            ],
        );
        let config = SpotPipelineConfig {
            threshold: 135,
            min_area: 20,
            max_area: 30,
            grouping: GroupingRule::CentroidDistance {
                group_diameter: 10.0,
            },
            ..SpotPipelineConfig::default()
        };
        let pipeline = SpotPipeline::new(config.clone()).expect("valid config");
        let scan = ScanRange {
            start: 10,
            stop: 240,
            step: 10,
        };
        let best = pipeline.find_best_threshold(&channel, &scan).expect("scan");
        // 130 is the first candidate exceeding both block values; every
        // later candidate ties at five groups and must not win.
        assert_eq!(best.threshold, 130);
        assert_eq!(best.group_count, 5);

        // Re-running the plain pipeline at the winning threshold reproduces
        // the recorded count exactly.
        let reran = SpotPipeline::new(SpotPipelineConfig {
            threshold: best.threshold,
            ..config
        })
        .expect("valid config");
        let analysis = reran.analyze_channel(&channel).expect("analysis");
        assert_eq!(analysis.groups.len(), best.group_count);
    }

    #[test]
    fn flat_scan_returns_first_candidate_with_count_zero() {
        let channel = GrayImage::from_pixel(50, 50, Luma([200]));
        let pipeline = SpotPipeline::new(three_block_config(10.0)).expect("valid config");
        let best = pipeline
            .find_best_threshold(&channel, &ScanRange::default())
            .expect("scan");
        assert_eq!(best.threshold, 10);
        assert_eq!(best.group_count, 0);
    }

    #[test]
    fn inverted_area_bounds_are_rejected_up_front() {
        let config = SpotPipelineConfig {
            min_area: 100,
            max_area: 10,
            ..SpotPipelineConfig::default()
        };
        let error = SpotPipeline::new(config).expect_err("invalid config");
        assert_eq!(
            error,
            ConfigError::AreaBoundsInverted {
                min_area: 100,
                max_area: 10
            }
        );
    }

    #[test]
    fn invalid_scan_ranges_are_rejected() {
        let channel = GrayImage::from_pixel(10, 10, Luma([200]));
        let pipeline = SpotPipeline::new(SpotPipelineConfig::default()).expect("valid config");

        let inverted = ScanRange {
            start: 200,
            stop: 100,
            step: 5,
        };
        assert_eq!(
            pipeline.find_best_threshold(&channel, &inverted),
            Err(ConfigError::EmptyScanRange {
                start: 200,
                stop: 100
            })
        );

        let zero_step = ScanRange {
            start: 10,
            stop: 100,
            step: 0,
        };
        assert_eq!(
            pipeline.find_best_threshold(&channel, &zero_step),
            Err(ConfigError::ZeroScanStep)
        );
    }

    #[test]
    fn scan_candidates_include_both_ends() {
        let scan = ScanRange {
            start: 10,
            stop: 30,
            step: 10,
        };
        let candidates: Vec<u8> = scan.candidates().collect();
        assert_eq!(candidates, vec![10, 20, 30]);

        let default_candidates: Vec<u8> = ScanRange::default().candidates().collect();
        assert_eq!(default_candidates.first(), Some(&10));
        assert_eq!(default_candidates.last(), Some(&245));
    }

    #[test]
    fn region_results_are_reported_in_full_image_coordinates() {
        let channel = channel_with_blocks(100, 100, 200, &[(30, 30, 5, 0)]);
        let config = SpotPipelineConfig {
            threshold: 100,
            min_area: 20,
            max_area: 30,
            region: Some(Region {
                x: 20,
                y: 20,
                width: 50,
                height: 50,
            }),
            ..SpotPipelineConfig::default()
        };
        let pipeline = SpotPipeline::new(config).expect("valid config");
        let analysis = pipeline.analyze_channel(&channel).expect("analysis");
        assert_eq!(analysis.spots.len(), 1);
        // The block occupies (30,30)..=(34,34) in full-image coordinates.
        assert_eq!(analysis.spots[0].centroid, (32.0, 32.0));
        assert_eq!(analysis.spots[0].bounding_box.min.x, 30);
        assert_eq!(analysis.groups[0].center, (32.0, 32.0));
    }

    #[test]
    fn region_excludes_spots_outside_it() {
        let channel = channel_with_blocks(100, 100, 200, &[(30, 30, 5, 0), (80, 80, 5, 0)]);
        let config = SpotPipelineConfig {
            threshold: 100,
            min_area: 20,
            max_area: 30,
            region: Some(Region {
                x: 20,
                y: 20,
                width: 30,
                height: 30,
            }),
            ..SpotPipelineConfig::default()
        };
        let pipeline = SpotPipeline::new(config).expect("valid config");
        let analysis = pipeline.analyze_channel(&channel).expect("analysis");
        assert_eq!(analysis.spots.len(), 1);
        assert_eq!(analysis.spots[0].bounding_box.min.x, 30);
    }

    #[test]
    fn out_of_bounds_region_is_rejected() {
        let channel = GrayImage::from_pixel(40, 40, Luma([200]));
        let region = Region {
            x: 20,
            y: 20,
            width: 30,
            height: 10,
        };
        let config = SpotPipelineConfig {
            region: Some(region),
            ..SpotPipelineConfig::default()
        };
        let pipeline = SpotPipeline::new(config).expect("valid config");
        assert_eq!(
            pipeline.analyze_channel(&channel),
            Err(ConfigError::RegionOutOfBounds {
                region,
                width: 40,
                height: 40
            })
        );
    }

    #[test]
    fn analyze_image_extracts_the_configured_channel() {
        // Blue blocks vanish in the red plane (value 0 there) but the white
        // background stays bright.
        let mut raster = RgbImage::from_pixel(60, 60, Rgb([255, 255, 255]));
        for y in 10..15 {
            for x in 10..15 {
                raster.put_pixel(x, y, Rgb([0, 0, 255]));
            }
        }
        let config = SpotPipelineConfig {
            channel: ChannelSelector::Red,
            threshold: 100,
            min_area: 20,
            max_area: 30,
            ..SpotPipelineConfig::default()
        };
        let pipeline = SpotPipeline::new(config).expect("valid config");
        let analysis = pipeline.analyze_image(&raster).expect("analysis");
        assert_eq!(analysis.spots.len(), 1);
        assert_eq!(analysis.spots[0].centroid, (12.0, 12.0));
    }

    #[test]
    fn default_config_carries_the_historical_parameters() {
        let config = SpotPipelineConfig::default();
        assert_eq!(config.threshold, 135);
        assert_eq!(config.min_area, 30);
        assert_eq!(config.max_area, 250);
        assert_eq!(
            config.grouping,
            GroupingRule::CentroidDistance {
                group_diameter: 60.0
            }
        );
        assert_eq!(config.direction, ThresholdDirection::Below);
        assert_eq!(config.connectivity, Connectivity::Eight);
    }
}
