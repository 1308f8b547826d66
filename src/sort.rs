use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk_splitter::ChunkSplitter;
use crate::config::Config;
use crate::error::{Result, SortError};
use crate::merge::merge;
use crate::row::{trim_line_terminator, Row};
use crate::scheduler::sort_chunks;
use crate::sort_key::SortKey;

/// Maximum number of chunk sorts in flight at once, unless configured otherwise.
pub const MAX_SORT_TASKS: usize = 8;

/// Timings and counts of a completed run.
#[derive(Clone, Debug)]
pub struct SortReport {
    split: Duration,
    sort: Duration,
    sort_tasks: Duration,
    merge: Duration,
    chunks: usize,
    rows: usize,
    output: PathBuf,
}

impl SortReport {
    /// Wall time of the split phase.
    pub fn split(&self) -> Duration {
        self.split
    }

    /// Wall time of the sort phase.
    pub fn sort(&self) -> Duration {
        self.sort
    }

    /// Sum of the per chunk sort durations. Larger than [SortReport::sort] when tasks overlap.
    pub fn sort_tasks(&self) -> Duration {
        self.sort_tasks
    }

    /// Wall time of the merge phase.
    pub fn merge(&self) -> Duration {
        self.merge
    }

    pub fn total(&self) -> Duration {
        self.split + self.sort + self.merge
    }

    /// Number of chunks actually produced, which may be lower than requested.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Number of data rows written to the output.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The sorted file.
    pub fn output(&self) -> &PathBuf {
        &self.output
    }
}

impl Display for SortReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "a) Time to split file: {:.3} sec", self.split.as_secs_f64())?;
        writeln!(
            f,
            "b) Time to sort files: {:.3} sec (tasks: {:.3} sec)",
            self.sort.as_secs_f64(),
            self.sort_tasks.as_secs_f64()
        )?;
        writeln!(f, "c) Time to merge: {:.3} sec", self.merge.as_secs_f64())?;
        writeln!(f, "Total time: {:.3} sec", self.total().as_secs_f64())?;
        write!(f, "Sorted {} rows from {} chunks into {}", self.rows, self.chunks, self.output.display())
    }
}

/// Sort a delimited file larger than memory by a list of field indices.
///
/// The first line of the input is a header and is not part of the output. The input is split
/// into chunks of roughly `size / chunks` bytes inside a work directory, every chunk is sorted
/// in memory, and the sorted chunks are merged into `sorted-<input file name>` in the same
/// directory. Chunk files are removed once merged.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use large_file_sort::sort::Sort;
///
/// fn sort_events(input: PathBuf) -> Result<PathBuf, anyhow::Error> {
///     // 20 chunks, ordered by the second field, then the fifth, then the sixth
///     let mut sort = Sort::new(input, 20, vec![1, 4, 5]);
///     // at most 4 chunks are sorted at the same time
///     sort.with_tasks(4);
///     let report = sort.sort()?;
///     println!("{}", report);
///     Ok(report.output().clone())
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    chunks: usize,
    fields: Vec<usize>,
    work_dir: Option<PathBuf>,
    tasks: usize,
    field_separator: char,
    parallel: bool,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * `chunks` is the requested number of chunks; the actual number may be lower
    /// * `fields` are zero based field indices in comparison order
    /// * the default field separator is ','
    /// * chunks are sorted in parallel, at most [MAX_SORT_TASKS] at a time
    /// * the work directory is `<input stem>-sorted` next to the input
    pub fn new(input: PathBuf, chunks: usize, fields: Vec<usize>) -> Sort {
        Sort {
            input,
            chunks,
            fields,
            work_dir: None,
            tasks: MAX_SORT_TASKS,
            field_separator: ',',
            parallel: true,
        }
    }

    /// Set the work directory. It is cleared at the start of every run.
    pub fn with_work_dir(&mut self, work_dir: PathBuf) {
        self.work_dir = Some(work_dir);
    }

    /// Set the maximum number of chunks sorted at the same time.
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the field separator. The default is ','
    pub fn with_field_separator(&mut self, field_separator: char) {
        self.field_separator = field_separator;
    }

    /// Sort chunks on a worker pool (true, the default) or one after the other.
    pub fn with_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(work_dir) => work_dir.clone(),
            None => {
                let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
                self.input.with_file_name(format!("{stem}-sorted"))
            }
        }
    }

    /// Path of the sorted file produced by [Sort::sort].
    pub fn output_path(&self) -> PathBuf {
        let name = self.input.file_name().unwrap_or_default().to_string_lossy();
        self.work_dir().join(format!("sorted-{name}"))
    }

    /// Run split, sort and merge. Each phase completes before the next one starts.
    pub fn sort(&self) -> Result<SortReport> {
        let config = Arc::new(self.create_config()?);
        let output = self.output_path();
        log::info!(
            "Start sorting {}, chunks: {}, fields: {:?}",
            self.input.display(),
            config.chunks(),
            config.sort_key().indices()
        );

        let start = Instant::now();
        let chunks = ChunkSplitter::new(&self.input, &config).split()?;
        let split = start.elapsed();
        log::info!("Split into {} chunks in {:?}", chunks.len(), split);

        let start = Instant::now();
        let sorted_chunks = sort_chunks(chunks, &config)?;
        let sort = start.elapsed();
        let sort_tasks = sorted_chunks.task_time();
        let chunk_count = sorted_chunks.chunks().len();
        log::info!("Sorted {} chunks in {:?}", chunk_count, sort);

        let start = Instant::now();
        let rows = merge(sorted_chunks.into_chunks(), &output, &config)?;
        let merge = start.elapsed();
        log::info!("Merged {} rows into {} in {:?}", rows, output.display(), merge);

        Ok(
            SortReport {
                split,
                sort,
                sort_tasks,
                merge,
                chunks: chunk_count,
                rows,
                output,
            }
        )
    }

    /// Check whether every line of `path` is ordered under the configured fields. The file is
    /// read as data rows only, as produced by [Sort::sort].
    pub fn check(&self, path: &Path) -> Result<bool> {
        let sort_key = SortKey::new(self.fields.clone())?;
        let unreadable = |source: std::io::Error| SortError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = BufReader::new(File::open(path).map_err(unreadable)?);
        let mut previous: Option<Row> = None;
        let mut line = Vec::new();
        let mut n = 0;
        while reader.read_until(b'\n', &mut line).map_err(unreadable)? != 0 {
            n += 1;
            trim_line_terminator(&mut line);
            let current = Row::parse(std::mem::take(&mut line), self.field_separator);
            sort_key.check(&current, || format!("{} line {}", path.display(), n))?;
            if let Some(previous) = &previous {
                if sort_key.compare(previous, &current).is_gt() {
                    log::info!("{} is not sorted at line {}", path.display(), n);
                    return Ok(false);
                }
            }
            previous = Some(current);
        }
        Ok(true)
    }

    fn create_config(&self) -> Result<Config> {
        if self.chunks == 0 {
            return Err(SortError::InvalidConfig("chunk count must be positive".to_string()));
        }
        if self.tasks == 0 {
            return Err(SortError::InvalidConfig("tasks must be positive".to_string()));
        }
        if matches!(self.field_separator, '\n' | '\r' | '\0') {
            return Err(SortError::InvalidConfig(format!("invalid field separator: {:?}", self.field_separator)));
        }
        if self.input.file_name().is_none() {
            return Err(SortError::InvalidConfig(format!("input is not a file path: {}", self.input.display())));
        }
        let work_dir = self.work_dir();
        if clears_input(&self.input, &work_dir) {
            return Err(
                SortError::InvalidConfig(
                    format!(
                        "work directory {} would remove the input {}",
                        work_dir.display(),
                        self.input.display()
                    )
                )
            );
        }
        let sort_key = SortKey::new(self.fields.clone())?;
        let extension = self.input
            .extension()
            .map(|extension| extension.to_string_lossy().to_string());

        Ok(
            Config::new(
                work_dir,
                extension,
                self.tasks,
                self.field_separator,
                self.parallel,
                self.chunks,
                sort_key,
            )
        )
    }
}

/// Whether clearing `work_dir` would delete `input`: the work directory is the input itself,
/// its directory or an ancestor of it.
fn clears_input(input: &Path, work_dir: &Path) -> bool {
    let input = resolve(input);
    let work_dir = resolve(work_dir);
    input == work_dir || input.parent().is_some_and(|input_dir| input_dir.starts_with(&work_dir))
}

/// Canonicalize the longest existing prefix of `path` and append the rest unchanged.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            resolve(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}
