//! Decoder for the fixed glog text layout:
//!
//! ```text
//! Lmmdd hh:mm:ss.uuuuuu threadid file:line] msg
//! ```
//!
//! The date/time prefix is not interpreted (the transcoder stamps events with
//! its own clock); the remaining fields are found by scanning forward to a
//! single-byte delimiter each.

use crate::error::ParseError;
use crate::record::{Location, ParsedFields, Severity};

/// Width of `Lmmdd hh:mm:ss.uuuuuu ` including the trailing space.
pub const HEADER_LEN: usize = 22;

/// Parse one record, reporting why a tagged record did not fit the layout.
///
/// Records whose first byte is not one of `IWEF` (and empty records) are
/// returned as unstructured with the whole line as message.
pub fn parse(record: &[u8]) -> Result<ParsedFields, ParseError> {
    let severity = match record.first() {
        Some(&tag) => Severity::from_tag(tag),
        None => Severity::Unstructured,
    };
    if !severity.is_structured() {
        // the whole line minus its terminator, so `@message` stays one line
        return Ok(ParsedFields::unstructured(line_text(record)));
    }

    check_header(record)?;

    let mut cursor = Cursor::new(record, HEADER_LEN);
    cursor.skip_spaces();
    let thread_id = number("threadid", cursor.until(b' ')?)?;
    cursor.skip(1);
    let file = String::from_utf8_lossy(cursor.until(b':')?).into_owned();
    cursor.skip(1);
    let line = number("line", cursor.until(b']')?)?;
    // "] "
    cursor.skip(2);

    Ok(ParsedFields {
        severity,
        location: Some(Location {
            thread_id,
            file,
            line,
        }),
        message: line_text(cursor.rest()),
    })
}

/// Parse one record, rendering anything malformed as unstructured text.
///
/// As with untagged lines, the trailing line terminator is not part of the
/// message.
pub fn parse_lossy(record: &[u8]) -> ParsedFields {
    parse(record).unwrap_or_else(|_| ParsedFields::unstructured(line_text(record)))
}

fn check_header(record: &[u8]) -> Result<(), ParseError> {
    if record.len() <= HEADER_LEN {
        return Err(ParseError::Truncated { len: record.len() });
    }
    let digits = |range: std::ops::Range<usize>| record[range].iter().all(u8::is_ascii_digit);
    let well_formed = digits(1..5)
        && record[5] == b' '
        && digits(6..8)
        && record[8] == b':'
        && digits(9..11)
        && record[11] == b':'
        && digits(12..14)
        && record[14] == b'.'
        && digits(15..21)
        && record[21] == b' ';
    if well_formed {
        Ok(())
    } else {
        Err(ParseError::BadHeader)
    }
}

fn number<T: std::str::FromStr>(field: &'static str, raw: &[u8]) -> Result<T, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        field,
        text: String::from_utf8_lossy(raw).into_owned(),
    };
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    // digits only, so the slice is valid UTF-8
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)
}

/// Text of a line without its terminator.
fn line_text(data: &[u8]) -> String {
    let data = data.strip_suffix(b"\n").unwrap_or(data);
    let data = data.strip_suffix(b"\r").unwrap_or(data);
    String::from_utf8_lossy(data).into_owned()
}

/// Forward-only read position over a record.
struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    fn skip(&mut self, n: usize) {
        self.position = (self.position + n).min(self.data.len());
    }

    /// The backend right-aligns the thread id.
    fn skip_spaces(&mut self) {
        while self.data.get(self.position) == Some(&b' ') {
            self.position += 1;
        }
    }

    /// Bytes from the current position up to, not including, `delim`.
    /// The cursor is left on the delimiter.
    fn until(&mut self, delim: u8) -> Result<&'a [u8], ParseError> {
        let start = self.position;
        let found = self.data[start..]
            .iter()
            .position(|&b| b == delim)
            .ok_or(ParseError::MissingDelimiter {
                delimiter: delim as char,
                offset: start,
            })?;
        self.position = start + found;
        Ok(&self.data[start..self.position])
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}
