use std::path::PathBuf;

use crate::sort_key::SortKey;

/// Immutable settings of one run, shared by the split, sort and merge phases.
#[derive(Clone, Debug)]
pub(crate) struct Config {
    work_dir: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    extension: Option<String>,
    tasks: usize,
    queue_size: usize,
    field_separator: char,
    parallel: bool,
    chunks: usize,
    sort_key: SortKey,
}

impl Config {
    pub(crate) fn new(
        work_dir: PathBuf,
        extension: Option<String>,
        tasks: usize,
        field_separator: char,
        parallel: bool,
        chunks: usize,
        sort_key: SortKey,
    ) -> Config {
        let queue_size = tasks * 2;
        Config {
            work_dir,
            tmp_prefix: "sorting-".to_string(),
            tmp_suffix: ".part".to_string(),
            extension,
            tasks,
            queue_size,
            field_separator,
            parallel,
            chunks,
            sort_key,
        }
    }

    pub(crate) fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn field_separator(&self) -> char {
        self.field_separator
    }

    pub(crate) fn parallel(&self) -> bool {
        self.parallel
    }

    pub(crate) fn chunks(&self) -> usize {
        self.chunks
    }

    pub(crate) fn sort_key(&self) -> &SortKey {
        &self.sort_key
    }

    /// Path of the chunk with the given 1-based sequence number.
    pub(crate) fn chunk_path(&self, sequence: usize) -> PathBuf {
        let name = match &self.extension {
            Some(extension) => format!("{sequence}.{extension}"),
            None => sequence.to_string(),
        };
        self.work_dir.join(name)
    }
}
