//! Line-level SSE parsing.

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Empty line - ends the current record
    Empty,
    /// Comment line (starts with ':')
    Comment(String),
    /// Record id (e.g., "id: 1425216000000")
    Id(String),
    /// Event kind (e.g., "event: insert")
    Event(String),
    /// Data payload (e.g., "data: {\"id\": \"x1\"}")
    Data(String),
    /// Any other field, ignored by the decoder
    Unknown { field: String, value: String },
}

/// Parse a single SSE line (without its line terminator).
///
/// The field name runs up to the first `:`. A single space after the colon
/// is not part of the value. A line without any colon is a field with an
/// empty value.
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(comment) = line.strip_prefix(':') {
        return SseLine::Comment(comment.trim_start().to_string());
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };

    match field {
        "id" => SseLine::Id(value.to_string()),
        "event" => SseLine::Event(value.to_string()),
        "data" => SseLine::Data(value.to_string()),
        _ => SseLine::Unknown {
            field: field.to_string(),
            value: value.to_string(),
        },
    }
}
