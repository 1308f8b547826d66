use std::path::PathBuf;

/// A chunk whose rows are ordered under the run's sort key.
///
/// Only the chunk sorter creates these, so the merge never sees a chunk that failed to sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SortedChunkFile {
    sequence: usize,
    path: PathBuf,
    lines: usize,
}

impl SortedChunkFile {
    pub(crate) fn new(sequence: usize, path: PathBuf, lines: usize) -> SortedChunkFile {
        SortedChunkFile {
            sequence,
            path,
            lines,
        }
    }

    pub(crate) fn sequence(&self) -> usize {
        self.sequence
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }
}
