//! This crate sorts a delimited text file that is too large to hold in memory by an ordered
//! list of field positions, for example a multi gigabyte CSV export.
//!
//! The sort runs in three phases, each completing before the next one starts:
//! * split - the header line is dropped and the remaining lines are written to chunk files of
//!   roughly `file size / requested chunks` bytes
//! * sort - each chunk is loaded, stably sorted in memory and rewritten in place. Chunks are
//!   sorted on a bounded worker pool
//! * merge - all sorted chunks are opened at once and merged into a single output file, after
//!   which the chunk files are removed
//!
//! Fields are compared as raw bytes with no numeric or locale aware collation. There is no
//! quoting: every occurrence of the separator starts a new field.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//! use large_file_sort::sort::Sort;
//!
//! fn sort_events(input: PathBuf) -> Result<(), anyhow::Error> {
//!     // split into 20 chunks and order by event_type, category_code, brand
//!     let sort = Sort::new(input, 20, vec![1, 4, 5]);
//!     let report = sort.sort()?;
//!     println!("{}", report);
//!     assert!(sort.check(report.output())?);
//!     Ok(())
//! }
//! ```

pub(crate) mod chunk_splitter;
pub(crate) mod config;
pub(crate) mod merge;
pub(crate) mod scheduler;
pub(crate) mod sort_command;
pub(crate) mod sorted_chunk_file;
pub(crate) mod unmerged_chunk_file;

pub mod error;
pub mod row;
pub mod sort;
pub mod sort_key;
