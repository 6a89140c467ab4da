//! Utility functions for working with source positions

use crate::types::Location;

/// The row and column of byte `offset` in `source`.
///
/// Returns `None` when `offset` is past the end or inside a UTF-8 sequence.
/// Columns count characters, not bytes.
pub fn offset_to_location(source: &str, offset: usize) -> Option<Location> {
    let before = source.get(..offset)?;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Some(Location {
        offset,
        row: before.matches('\n').count(),
        column: before[line_start..].chars().count(),
    })
}

/// The line of `source` containing byte `offset`, without its line break.
///
/// An offset pointing at a `\n` belongs to the line that the `\n` ends.
pub fn line_text(source: &str, offset: usize) -> &str {
    let offset = offset.min(source.len());
    let start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = source[offset..]
        .find('\n')
        .map_or(source.len(), |i| offset + i);
    source[start..end].trim_end_matches('\r')
}
