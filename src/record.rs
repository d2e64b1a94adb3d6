use std::fmt;

/// Severity tag found in the first byte of a glog text record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
    /// Free text without a recognized tag.
    Unstructured,
}

impl Severity {
    /// Map the leading byte of a record to a severity.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b'I' => Severity::Info,
            b'W' => Severity::Warning,
            b'E' => Severity::Error,
            b'F' => Severity::Fatal,
            _ => Severity::Unstructured,
        }
    }

    /// Single-character tag written at the start of a glog header.
    pub fn tag(self) -> Option<char> {
        match self {
            Severity::Info => Some('I'),
            Severity::Warning => Some('W'),
            Severity::Error => Some('E'),
            Severity::Fatal => Some('F'),
            Severity::Unstructured => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Unstructured => "UNSTRUCTURED",
        }
    }

    pub fn is_structured(self) -> bool {
        !matches!(self, Severity::Unstructured)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a structured record: `threadid file:line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub thread_id: u64,
    pub file: String,
    pub line: u32,
}

/// Typed view of one text record.
///
/// `location` is `Some` exactly when `severity` is a structured severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFields {
    pub severity: Severity,
    pub location: Option<Location>,
    pub message: String,
}

impl ParsedFields {
    pub fn unstructured(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Unstructured,
            location: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_matching_names() {
        assert_eq!(Severity::from_tag(b'I').as_str(), "INFO");
        assert_eq!(Severity::from_tag(b'W').as_str(), "WARNING");
        assert_eq!(Severity::from_tag(b'E').as_str(), "ERROR");
        assert_eq!(Severity::from_tag(b'F').as_str(), "FATAL");
        assert_eq!(Severity::from_tag(b'p'), Severity::Unstructured);
    }

    #[test]
    fn tag_round_trips_for_structured_severities() {
        for sev in [Severity::Info, Severity::Warning, Severity::Error, Severity::Fatal] {
            let tag = sev.tag().map(|c| c as u8);
            assert_eq!(tag.map(Severity::from_tag), Some(sev));
            assert!(sev.is_structured());
        }
        assert_eq!(Severity::Unstructured.tag(), None);
    }
}
