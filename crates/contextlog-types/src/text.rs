//! Bounded text fields.
//!
//! Every text field on a message has a byte budget. Oversize input is cut on a
//! UTF-8 character boundary and suffixed with [`ELLIPSIS`]; the result never
//! exceeds the budget.

use std::borrow::Cow;

/// Byte budget for the message body.
pub const MESSAGE_BUDGET: usize = 4096;
/// Byte budget for component names.
pub const COMPONENT_BUDGET: usize = 128;
/// Byte budget for function names.
pub const FUNCTION_BUDGET: usize = 128;
/// Byte budget for source file paths.
pub const FILE_BUDGET: usize = 256;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Truncate `input` to at most `budget` bytes.
///
/// Borrows when the input already fits.
pub fn truncate(input: &str, budget: usize) -> Cow<'_, str> {
    if input.len() <= budget {
        return Cow::Borrowed(input);
    }
    if budget < ELLIPSIS.len() {
        return Cow::Owned(input[..floor_char_boundary(input, budget)].to_string());
    }
    let cut = floor_char_boundary(input, budget - ELLIPSIS.len());
    let mut out = String::with_capacity(cut + ELLIPSIS.len());
    out.push_str(&input[..cut]);
    out.push_str(ELLIPSIS);
    Cow::Owned(out)
}

/// Owned variant of [`truncate`] used when building records.
pub fn bounded(input: &str, budget: usize) -> String {
    truncate(input, budget).into_owned()
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
