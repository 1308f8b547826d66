use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool_builder::ThreadPoolBuilder;

use crate::chunk_splitter::Chunk;
use crate::config::Config;
use crate::error::{Result, SortError};
use crate::sort_command::{SortCommand, SortOutcome};
use crate::sorted_chunk_file::SortedChunkFile;

/// Chunks sorted by one sort phase, in chunk sequence order.
#[derive(Debug)]
pub(crate) struct SortedChunks {
    chunks: Vec<SortedChunkFile>,
    task_time: Duration,
}

impl SortedChunks {
    pub(crate) fn chunks(&self) -> &Vec<SortedChunkFile> {
        &self.chunks
    }

    pub(crate) fn into_chunks(self) -> Vec<SortedChunkFile> {
        self.chunks
    }

    /// Sum of the time spent in each chunk sort. Tasks overlap, so this is not wall time.
    pub(crate) fn task_time(&self) -> Duration {
        self.task_time
    }
}

#[derive(Default)]
struct Completions {
    sorted: Vec<SortedChunkFile>,
    failures: Vec<(usize, SortError)>,
    task_time: Duration,
}

impl Completions {
    fn record(&mut self, outcome: SortOutcome) {
        self.task_time += outcome.elapsed();
        let sequence = outcome.chunk().sequence();
        match outcome.into_result() {
            Ok(sorted) => {
                log::debug!("Sorted chunk {}, lines: {}", sorted.path().display(), sorted.lines());
                self.sorted.push(sorted);
            }
            Err(e) => {
                log::error!("Failed to sort chunk {}: {}", sequence, e);
                self.failures.push((sequence, e));
            }
        }
    }

    /// Surface the failure of the lowest numbered chunk, or the sorted chunks in sequence order
    /// regardless of the order in which they completed.
    fn finish(mut self) -> Result<SortedChunks> {
        if !self.failures.is_empty() {
            self.failures.sort_by_key(|(sequence, _)| *sequence);
            let (_, e) = self.failures.swap_remove(0);
            return Err(e);
        }
        self.sorted.sort_by_key(|sorted| sorted.sequence());
        Ok(
            SortedChunks {
                chunks: self.sorted,
                task_time: self.task_time,
            }
        )
    }
}

/// Sort every chunk, either one after the other or on the worker pool, depending on
/// configuration. Returns only when all chunks completed.
pub(crate) fn sort_chunks(chunks: Vec<Chunk>, config: &Arc<Config>) -> Result<SortedChunks> {
    if config.parallel() && chunks.len() > 1 {
        sort_parallel(chunks, config)
    } else {
        sort_sequential(chunks, config)
    }
}

fn sort_sequential(chunks: Vec<Chunk>, config: &Config) -> Result<SortedChunks> {
    log::info!("Start sequential sort of {} chunks", chunks.len());
    let mut completions = Completions::default();
    for chunk in &chunks {
        completions.record(SortOutcome::run(chunk, config));
    }
    log::info!("Finish sequential sort");
    completions.finish()
}

/// Keeps at most `tasks` chunk sorts in flight. Each completion frees a slot that is refilled
/// from the queue until it drains, then the remaining tasks are collected.
fn sort_parallel(chunks: Vec<Chunk>, config: &Arc<Config>) -> Result<SortedChunks> {
    log::info!("Start parallel sort of {} chunks, tasks: {}", chunks.len(), config.tasks());
    let mut thread_pool_builder = ThreadPoolBuilder::new();
    let mut sorting_pool = thread_pool_builder
        .with_name("sorting".to_string())
        .with_tasks(config.tasks())
        .with_queue_size(config.queue_size())
        .with_shutdown_mode(ShutdownMode::CompletePending)
        .build()
        .map_err(|e| SortError::WorkerPool(e.to_string()))?;

    let (sender, receiver) = crossbeam::channel::unbounded::<SortOutcome>();
    let mut pending: VecDeque<Chunk> = chunks.into_iter().collect();
    let mut in_flight = 0;
    while in_flight < config.tasks() {
        match pending.pop_front() {
            Some(chunk) => {
                sorting_pool.submit(Box::new(SortCommand::new(chunk, config.clone(), sender.clone())));
                in_flight += 1;
            }
            None => break,
        }
    }

    let mut completions = Completions::default();
    while in_flight > 0 {
        let outcome = receiver.recv()
            .map_err(|e| SortError::WorkerPool(e.to_string()))?;
        in_flight -= 1;
        completions.record(outcome);
        if let Some(chunk) = pending.pop_front() {
            sorting_pool.submit(Box::new(SortCommand::new(chunk, config.clone(), sender.clone())));
            in_flight += 1;
        }
    }

    log::info!("Shutting down sorting pool");
    sorting_pool.shutdown();
    sorting_pool.join()
        .map_err(|e| SortError::WorkerPool(e.to_string()))?;
    log::info!("Finish parallel sort");
    completions.finish()
}
