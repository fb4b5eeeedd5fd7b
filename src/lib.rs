// THEORY:
// This file is the main entry point for the `spot_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API that will be exposed to external consumers (an image-analysis
// frontend, a batch script, a test harness).
//
// The primary goal is to export the `SpotPipeline` and its associated data
// structures (`SpotPipelineConfig`, `SpotAnalysis`, `ThresholdResult`) as the
// clean, high-level interface for the detection engine, alongside the
// `ParallelThresholdSearch` driver for the threshold sweep. The internal
// modules (`core_modules`) hold the individual stages and their data types.

pub mod core_modules;
pub mod pipeline;
pub mod parallel_pipeline;
