//! Indentation rewriting for template literals.
//!
//! Templates are usually written indented to match the surrounding Rust
//! code. Before output, the indentation shared by the literal text is
//! stripped and replaced with the indent of the place the template is
//! rendered at, so nested templates come out aligned without manual
//! bookkeeping:
//!
//! ```
//! use weft::html;
//!
//! let item = html!("<li>\n  ", "x", "\n</li>");
//! let list = html!("<ul>\n  ", item, "\n</ul>");
//!
//! assert_eq!(list.render().unwrap(), "<ul>\n  <li>\n    x\n  </li>\n</ul>");
//! ```
//!
//! Rules:
//!
//! - Only lines that start after a `\n` inside a literal take part; the text
//!   before a literal's first newline continues the previous line.
//! - The shared indent is the minimum leading whitespace (spaces and tabs,
//!   one column each) over all such lines that have a non-whitespace
//!   character within their literal, computed once per template.
//! - Every such line loses up to the shared indent and gains `base` spaces,
//!   blank lines included.
//! - A value takes the rewritten indent of the line it sits on. When the
//!   literal before it has no newline, the previous indent carries over.

use std::borrow::Cow;

fn leading_ws(line: &str) -> usize {
    line.bytes().take_while(|b| matches!(b, b' ' | b'\t')).count()
}

/// Computes the indent shared by every line of `literals` that starts after
/// a newline and reaches a non-whitespace character.
pub fn min_indent<S: AsRef<str>>(literals: &[S]) -> usize {
    literals
        .iter()
        .flat_map(|literal| literal.as_ref().split('\n').skip(1))
        .filter(|line| !line.trim().is_empty())
        .map(leading_ws)
        .min()
        .unwrap_or(0)
}

/// Rewrites the lines of one literal: strip up to `min` columns and prepend
/// `base` spaces to every line after a newline.
pub fn reindent(literal: &str, min: usize, base: usize) -> Cow<'_, str> {
    if (min == 0 && base == 0) || !literal.contains('\n') {
        return Cow::Borrowed(literal);
    }

    let mut out = String::with_capacity(literal.len() + base * 4);
    let mut lines = literal.split('\n');
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        out.extend(std::iter::repeat_n(' ', base));
        out.push_str(&line[leading_ws(line).min(min)..]);
    }
    Cow::Owned(out)
}

/// Returns the rewritten indent of the last line of `literal`, or `None`
/// when the literal has no newline.
pub fn line_indent(literal: &str, min: usize, base: usize) -> Option<usize> {
    let (_, last_line) = literal.rsplit_once('\n')?;
    Some(base + leading_ws(last_line).saturating_sub(min))
}
