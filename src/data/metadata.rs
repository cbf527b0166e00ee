use super::model::MetadataRecord;

/// Marker that starts every metadata (and free-form comment) line.
pub const COMMENT_MARKER: char = '#';

/// Parse one comment line into a `(key, value)` pair.
///
/// The text after the marker must hold exactly one comma with a non-empty
/// key and value on either side (both trimmed). Anything else is a free-form
/// comment and yields `None`.
pub fn parse_metadata_line(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix(COMMENT_MARKER)?;
    let (key, value) = body.split_once(',')?;
    if value.contains(',') {
        return None;
    }
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Collect the metadata of a file from its raw lines. Later lines win for a
/// repeated key; non-comment lines are ignored.
pub fn extract_metadata<'a, I>(lines: I) -> MetadataRecord
where
    I: IntoIterator<Item = &'a str>,
{
    let mut meta = MetadataRecord::new();
    for line in lines {
        if let Some((key, value)) = parse_metadata_line(line) {
            meta.insert(key, value);
        }
    }
    meta
}
