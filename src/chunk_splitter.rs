use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Phase, Result, SortError};
use crate::row::trim_line_terminator;

/// A contiguous run of input rows written to its own file, not yet sorted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Chunk {
    sequence: usize,
    path: PathBuf,
    rows: usize,
}

impl Chunk {
    pub(crate) fn new(sequence: usize, path: PathBuf, rows: usize) -> Chunk {
        Chunk {
            sequence,
            path,
            rows,
        }
    }

    pub(crate) fn sequence(&self) -> usize {
        self.sequence
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }
}

struct ChunkWriter {
    chunk: Chunk,
    writer: BufWriter<File>,
    bytes: u64,
}

impl ChunkWriter {
    fn create(sequence: usize, path: PathBuf) -> Result<ChunkWriter> {
        let file = File::create(&path)
            .map_err(|source| write_failure(&path, source))?;
        Ok(
            ChunkWriter {
                chunk: Chunk::new(sequence, path, 0),
                writer: BufWriter::new(file),
                bytes: 0,
            }
        )
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.writer.write_all(line)
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|source| write_failure(self.chunk.path(), source))?;
        // the terminator is not counted
        self.bytes += line.len() as u64;
        self.chunk.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<Chunk> {
        self.writer.flush()
            .map_err(|source| write_failure(self.chunk.path(), source))?;
        Ok(self.chunk)
    }
}

fn write_failure(path: &Path, source: std::io::Error) -> SortError {
    SortError::ChunkWriteFailure {
        phase: Phase::Split,
        path: path.to_path_buf(),
        source,
    }
}

/// Partitions the rows of a source file into chunk files of bounded size.
///
/// The first line of the source is a header and is dropped. A chunk is closed as soon as the
/// byte length of the lines written to it exceeds `source size / requested chunks`, so the
/// number of chunks produced may be lower than requested. No chunk is empty.
pub(crate) struct ChunkSplitter<'a> {
    source: &'a Path,
    config: &'a Config,
}

impl<'a> ChunkSplitter<'a> {
    pub(crate) fn new(source: &'a Path, config: &'a Config) -> ChunkSplitter<'a> {
        ChunkSplitter {
            source,
            config,
        }
    }

    /// Threshold in bytes above which the current chunk is closed.
    pub(crate) fn threshold(total_size: u64, chunks: usize) -> u64 {
        total_size / chunks as u64
    }

    pub(crate) fn split(&self) -> Result<Vec<Chunk>> {
        let unreadable = |source: std::io::Error| SortError::SourceUnreadable {
            path: self.source.to_path_buf(),
            source,
        };
        let file = File::open(self.source).map_err(unreadable)?;
        let total_size = file.metadata().map_err(unreadable)?.len();
        let threshold = Self::threshold(total_size, self.config.chunks());
        log::info!(
            "Splitting {}, size: {} bytes, requested chunks: {}, threshold: {} bytes",
            self.source.display(),
            total_size,
            self.config.chunks(),
            threshold
        );

        self.prepare_work_dir()?;

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        // header
        reader.read_until(b'\n', &mut line).map_err(unreadable)?;

        let mut chunks = Vec::new();
        let mut current: Option<ChunkWriter> = None;
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).map_err(unreadable)? == 0 {
                break;
            }
            trim_line_terminator(&mut line);

            let mut writer = match current.take() {
                Some(writer) => writer,
                None => {
                    let sequence = chunks.len() + 1;
                    ChunkWriter::create(sequence, self.config.chunk_path(sequence))?
                }
            };
            writer.write_line(&line)?;

            if writer.bytes > threshold {
                chunks.push(writer.finish()?);
            } else {
                current = Some(writer);
            }
        }
        if let Some(writer) = current.take() {
            chunks.push(writer.finish()?);
        }

        log::info!("Finished splitting {} into {} chunks", self.source.display(), chunks.len());
        Ok(chunks)
    }

    fn prepare_work_dir(&self) -> Result<()> {
        let work_dir = self.config.work_dir();
        if work_dir.exists() {
            log::info!("Clearing work directory {}", work_dir.display());
            fs::remove_dir_all(work_dir)
                .map_err(|source| write_failure(work_dir, source))?;
        }
        fs::create_dir_all(work_dir)
            .map_err(|source| write_failure(work_dir, source))
    }
}
