// THEORY:
// The threshold search is embarrassingly parallel: each candidate threshold
// runs the same pure chain on the same read-only channel, and no iteration
// depends on another. This module distributes the scan over a pool of worker
// tasks while keeping the result bit-identical to the sequential search.
//
// Structure:
// 1.  **Worker Pool**: A dispatcher task receives scan tasks on an unbounded
//     channel and round-robins them across per-worker channels. Each worker
//     owns nothing mutable; it shares the pipeline and the cropped channel
//     through `Arc` and answers every task over a `oneshot` channel. Pool
//     size follows the machine's logical CPU count.
// 2.  **Deterministic Selection**: Replies arrive in whatever order the
//     workers finish. Relying on "first seen wins" would make the tie-break
//     depend on scheduling, so all (threshold, group count) pairs are
//     collected, sorted by threshold, and only then reduced with the same
//     strict-improvement rule the sequential search uses. Ties therefore
//     always resolve to the lowest threshold.
// 3.  **Shutdown by Drop**: Dropping the pool closes the intake channel,
//     which ends the dispatcher, drops the per-worker senders, and lets every
//     worker run to completion. No explicit shutdown message is needed.

use crate::pipeline::{ConfigError, ScanRange, SpotPipeline, SpotPipelineConfig, ThresholdResult};
use futures::future::join_all;
use image::GrayImage;
use log::debug;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// One candidate threshold to score, with the channel to answer on.
pub struct ScanTask {
    pub threshold: u8,
    pub result_sender: oneshot::Sender<ThresholdResult>,
}

/// A pool of worker tasks scoring candidate thresholds against a shared
/// channel view.
pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ScanTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<SpotPipeline>, view: Arc<GrayImage>) -> Self {
        let worker_count = num_cpus::get().max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ScanTask>();

        // Create one channel per worker and a dispatcher that distributes
        // incoming tasks round-robin.
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<ScanTask>())
            .unzip();

        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let mut workers = Vec::new();
        for mut worker_receiver in worker_receivers {
            let pipeline = Arc::clone(&pipeline);
            let view = Arc::clone(&view);
            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let group_count = pipeline.group_count_at(&view, task.threshold);
                    let _ = task.result_sender.send(ThresholdResult {
                        threshold: task.threshold,
                        group_count,
                    });
                }
            });
            workers.push(worker);
        }

        Self {
            task_sender,
            workers,
        }
    }

    pub fn submit(&self, task: ScanTask) -> Result<(), &'static str> {
        self.task_sender
            .send(task)
            .map_err(|_| "Failed to send task to worker pool")
    }
}

/// Parallel driver for the threshold search. Produces exactly the same
/// `ThresholdResult` as `SpotPipeline::find_best_threshold` for the same
/// inputs.
pub struct ParallelThresholdSearch {
    pipeline: Arc<SpotPipeline>,
}

impl ParallelThresholdSearch {
    /// Validates the configuration and builds the search driver.
    pub fn new(config: SpotPipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pipeline: Arc::new(SpotPipeline::new(config)?),
        })
    }

    /// Scores every candidate threshold across the worker pool and selects
    /// by (group count descending, threshold ascending).
    pub async fn find_best_threshold(
        &self,
        channel: &GrayImage,
        scan: &ScanRange,
    ) -> Result<ThresholdResult, ConfigError> {
        scan.validate()?;
        let view = Arc::new(match self.pipeline.cropped_channel(channel)? {
            Some(cropped) => cropped,
            None => channel.clone(),
        });

        let pool = WorkerPool::new(Arc::clone(&self.pipeline), view);
        let mut result_receivers = Vec::new();
        for threshold in scan.candidates() {
            let (result_sender, result_receiver) = oneshot::channel();
            if pool
                .submit(ScanTask {
                    threshold,
                    result_sender,
                })
                .is_err()
            {
                break;
            }
            result_receivers.push(result_receiver);
        }

        let mut results: Vec<ThresholdResult> = join_all(result_receivers)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect();
        debug!("parallel scan scored {} candidates", results.len());

        // Arrival order is scheduler-dependent; the selection must not be.
        results.sort_by_key(|result| result.threshold);
        let mut best: Option<ThresholdResult> = None;
        for result in results {
            let improved = match &best {
                None => true,
                Some(incumbent) => result.group_count > incumbent.group_count,
            };
            if improved {
                best = Some(result);
            }
        }

        Ok(best.unwrap_or(ThresholdResult {
            threshold: scan.start,
            group_count: 0,
        }))
    }
}
