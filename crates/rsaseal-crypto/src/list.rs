//! Delimited string lists
//!
//! `encode_list` and `decode_list` are inverses for any list whose items do
//! not contain the delimiter, including the empty list: it encodes to `""` and
//! `""` decodes back to no items (not one empty item).

use std::fmt::{Display, Write};

/// Default list delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// Join `items` with a single `delimiter` between neighbours.
pub fn encode_list<I>(items: I, delimiter: char) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let mut out = String::new();
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        // Writing into a String cannot fail
        let _ = write!(out, "{item}");
    }
    out
}

/// Split a delimited list. The empty string is the empty list.
pub fn decode_list(list: &str, delimiter: char) -> Vec<&str> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(delimiter).collect()
}

/// Split a delimited list and convert each item, stopping at the first
/// failure. The error carries the index of the offending item.
pub fn decode_list_with<T, E, F>(
    list: &str,
    delimiter: char,
    mut convert: F,
) -> Result<Vec<T>, (usize, E)>
where
    F: FnMut(&str) -> Result<T, E>,
{
    decode_list(list, delimiter)
        .into_iter()
        .enumerate()
        .map(|(index, item)| convert(item).map_err(|e| (index, e)))
        .collect()
}
