use std::ops::Range;

/// A line split into fields on a single separator character.
///
/// There is no quoting or escaping: every occurrence of the separator starts a new field, and
/// trailing empty fields are kept. Lines are raw bytes, so input in any ASCII compatible
/// encoding is accepted, and the original line is retained so rows are written back verbatim.
///
/// # Examples
/// ```
/// use large_file_sort::row::Row;
/// let row = Row::parse("a,,b,", ',');
/// assert_eq!(row.field_count(), 4);
/// assert_eq!(row.field(1), Some(&b""[..]));
/// assert_eq!(row.field(2), Some(&b"b"[..]));
/// assert_eq!(row.field(4), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    line: Vec<u8>,
    fields: Vec<Range<usize>>,
}

impl Row {
    /// Parse `line`, which must not contain the line terminator.
    pub fn parse(line: impl Into<Vec<u8>>, field_separator: char) -> Row {
        let line = line.into();
        let mut buffer = [0u8; 4];
        let separator = field_separator.encode_utf8(&mut buffer).as_bytes();
        let mut fields = Vec::new();
        let mut start = 0;
        let mut position = 0;
        while position + separator.len() <= line.len() {
            if &line[position..position + separator.len()] == separator {
                fields.push(start..position);
                position += separator.len();
                start = position;
            } else {
                position += 1;
            }
        }
        fields.push(start..line.len());
        Row {
            line,
            fields,
        }
    }

    /// Get the field at the zero based `index`, or None when the row is too short.
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields
            .get(index)
            .map(|range| &self.line[range.clone()])
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn line(&self) -> &[u8] {
        &self.line
    }

    pub fn into_line(self) -> Vec<u8> {
        self.line
    }
}

/// Strip a trailing `\n` or `\r\n` from a line read with `read_until`.
pub(crate) fn trim_line_terminator(line: &mut Vec<u8>) {
    if line.ends_with(b"\n") {
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
    }
}
