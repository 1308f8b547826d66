use std::cmp::Ordering;

use crate::error::{Result, SortError};
use crate::row::Row;

/// Ordered list of zero based field indices defining comparison precedence.
///
/// Fields are compared as raw bytes, which for UTF-8 input is the order of the strings. The
/// first index with a non-equal comparison decides; fields outside the key never participate.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use large_file_sort::row::Row;
/// use large_file_sort::sort_key::SortKey;
///
/// let key = SortKey::new(vec![0, 1]).unwrap();
/// let a = Row::parse("a,2", ',');
/// let b = Row::parse("a,10", ',');
/// // no numeric coercion: "10" < "2"
/// assert_eq!(key.compare(&a, &b), Ordering::Greater);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    indices: Vec<usize>,
}

impl SortKey {
    /// Create a sort key. An empty list of indices is rejected.
    pub fn new(indices: Vec<usize>) -> Result<SortKey> {
        if indices.is_empty() {
            Err(SortError::InvalidConfig("sort key requires at least one field index".to_string()))
        } else {
            Ok(SortKey { indices })
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The minimal field count a row needs so that every key index resolves.
    pub fn required_fields(&self) -> usize {
        self.indices.iter().max().map_or(0, |max| max + 1)
    }

    /// Check that `row` can be compared under this key. `location` names the row in the error.
    pub fn check(&self, row: &Row, location: impl FnOnce() -> String) -> Result<()> {
        let required = self.required_fields();
        if row.field_count() < required {
            Err(
                SortError::ComparisonArityMismatch {
                    location: location(),
                    expected: required,
                    found: row.field_count(),
                }
            )
        } else {
            Ok(())
        }
    }

    /// Compare two rows position by position. A missing field sorts before a present one and
    /// two missing fields are equal; rows that passed [SortKey::check] never hit that case.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for index in &self.indices {
            let ordering = a.field(*index).cmp(&b.field(*index));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
