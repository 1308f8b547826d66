use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use command_executor::command::Command;
use crossbeam::channel::Sender;
use tempfile::Builder;

use crate::chunk_splitter::Chunk;
use crate::config::Config;
use crate::error::{Phase, Result, SortError};
use crate::row::{trim_line_terminator, Row};
use crate::sorted_chunk_file::SortedChunkFile;

/// Load every row of `chunk`, checking each against the sort key and the field count of the
/// chunk's first row.
pub(crate) fn read_rows(chunk: &Chunk, config: &Config) -> Result<Vec<Row>> {
    let read_failure = |source: std::io::Error| SortError::ChunkReadFailure {
        path: chunk.path().clone(),
        source,
    };
    let mut reader = BufReader::new(File::open(chunk.path()).map_err(read_failure)?);
    let mut rows: Vec<Row> = Vec::with_capacity(chunk.rows());
    let mut n = 0;
    let mut line = Vec::new();
    while reader.read_until(b'\n', &mut line).map_err(read_failure)? != 0 {
        n += 1;
        trim_line_terminator(&mut line);
        let row = Row::parse(std::mem::take(&mut line), config.field_separator());
        let location = || format!("{} line {}", chunk.path().display(), n);
        config.sort_key().check(&row, location)?;
        if let Some(first) = rows.first() {
            if first.field_count() != row.field_count() {
                return Err(
                    SortError::ComparisonArityMismatch {
                        location: location(),
                        expected: first.field_count(),
                        found: row.field_count(),
                    }
                );
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Sort one chunk in memory and replace its content with the sorted rows.
///
/// The sort is stable. The rows are written to a temporary file next to the chunk, which is
/// then renamed over it, so the chunk is never observed half rewritten.
pub(crate) fn sort_chunk(chunk: &Chunk, config: &Config) -> Result<SortedChunkFile> {
    let mut rows = read_rows(chunk, config)?;
    let sort_key = config.sort_key();
    rows.sort_by(|a, b| sort_key.compare(a, b));

    let write_failure = |source: std::io::Error| SortError::ChunkWriteFailure {
        phase: Phase::Sort,
        path: chunk.path().clone(),
        source,
    };
    let tmp_file = Builder::new()
        .prefix(config.tmp_prefix())
        .suffix(config.tmp_suffix())
        .tempfile_in(config.work_dir())
        .map_err(write_failure)?;
    let mut writer = BufWriter::new(tmp_file);
    let lines = rows.len();
    for row in rows {
        writer.write_all(row.line()).map_err(write_failure)?;
        writer.write_all(b"\n").map_err(write_failure)?;
    }
    let tmp_file = writer.into_inner()
        .map_err(|e| write_failure(e.into_error()))?;
    tmp_file.persist(chunk.path())
        .map_err(|e| write_failure(e.error))?;

    Ok(SortedChunkFile::new(chunk.sequence(), chunk.path().clone(), lines))
}

/// The result of sorting one chunk, tagged with the chunk it belongs to.
#[derive(Debug)]
pub(crate) struct SortOutcome {
    chunk: Chunk,
    elapsed: Duration,
    result: Result<SortedChunkFile>,
}

impl SortOutcome {
    /// Sort `chunk`, turning a panic into a [SortError::TaskPanicked] result.
    pub(crate) fn run(chunk: &Chunk, config: &Config) -> SortOutcome {
        let start = Instant::now();
        log::debug!("Start sorting chunk {}", chunk.path().display());
        let result = catch_unwind(AssertUnwindSafe(|| sort_chunk(chunk, config)))
            .unwrap_or_else(|_| Err(SortError::TaskPanicked { path: chunk.path().clone() }));
        let elapsed = start.elapsed();
        log::debug!("Finish sorting chunk {}, elapsed: {:?}", chunk.path().display(), elapsed);
        SortOutcome {
            chunk: chunk.clone(),
            elapsed,
            result,
        }
    }

    pub(crate) fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn into_result(self) -> Result<SortedChunkFile> {
        self.result
    }
}

/// Pool task sorting a single chunk and reporting its outcome on the completion channel.
pub(crate) struct SortCommand {
    chunk: Chunk,
    config: Arc<Config>,
    completions: Sender<SortOutcome>,
}

impl SortCommand {
    pub(crate) fn new(chunk: Chunk, config: Arc<Config>, completions: Sender<SortOutcome>) -> SortCommand {
        SortCommand {
            chunk,
            config,
            completions,
        }
    }
}

impl Command for SortCommand {
    fn execute(&self) -> std::result::Result<(), anyhow::Error> {
        let outcome = SortOutcome::run(&self.chunk, &self.config);
        self.completions.send(outcome)
            .map_err(|_| anyhow!("completion channel closed, chunk: {}", self.chunk.path().display()))?;
        Ok(())
    }
}
