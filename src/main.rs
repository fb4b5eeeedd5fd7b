// This file is a small demonstration of how to use the `spot_vision`
// library. The main library entry point is `src/lib.rs`.

use image::{GrayImage, Luma};
use spot_vision::parallel_pipeline::ParallelThresholdSearch;
use spot_vision::pipeline::{
    GroupingRule, ScanRange, SpotPipeline, SpotPipelineConfig,
};

#[tokio::main]
async fn main() {
    // --- 1. Synthetic Test Image ---
    // A bright plate with two clusters of dark 6x6 spots.
    let mut channel = GrayImage::from_pixel(300, 200, Luma([200]));
    let spot_origins = [
        (40, 40),
        (52, 44),
        (46, 58),
        (220, 120),
        (232, 128),
        (226, 140),
    ];
    for &(x0, y0) in &spot_origins {
        for y in y0..y0 + 6 {
            for x in x0..x0 + 6 {
                channel.put_pixel(x, y, Luma([30]));
            }
        }
    }

    // --- 2. Pipeline Configuration ---
    let config = SpotPipelineConfig {
        threshold: 100,
        min_area: 20,
        max_area: 100,
        grouping: GroupingRule::CentroidDistance {
            group_diameter: 60.0,
        },
        ..SpotPipelineConfig::default()
    };
    let pipeline = SpotPipeline::new(config.clone()).expect("valid configuration");

    // --- 3. Single-Threshold Analysis ---
    let analysis = pipeline.analyze_channel(&channel).expect("analysis");
    println!(
        "threshold {}: {} spots in {} groups",
        config.threshold,
        analysis.spots.len(),
        analysis.groups.len()
    );
    for (index, group) in analysis.groups.iter().enumerate() {
        println!(
            "  group {}: center ({:.1}, {:.1}), radius {:.1}, {} spots",
            index + 1,
            group.center.0,
            group.center.1,
            group.radius,
            group.spot_indices.len()
        );
    }

    // --- 4. Threshold Search ---
    // Sweep the default scan range across all CPU cores and report the
    // threshold that maximizes the number of groups.
    let search = ParallelThresholdSearch::new(config).expect("valid configuration");
    let best = search
        .find_best_threshold(&channel, &ScanRange::default())
        .await
        .expect("scan");
    println!(
        "recommended threshold: {} ({} groups)",
        best.threshold, best.group_count
    );
}
