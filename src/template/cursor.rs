//! Pull-based traversal of a template tree.
//!
//! [`Chunks`] keeps an explicit stack of frames instead of recursing, so
//! arbitrarily deep nesting costs heap, not call stack, and the traversal can
//! stop at a pending value and be picked up again by the caller.

use std::borrow::Cow;

use super::indent::{line_indent, reindent};
use super::{Node, Pending, Value, escape};
use crate::error::TemplateError;

/// One piece of rendered output.
#[derive(Debug)]
pub enum Chunk<'a> {
    /// Finished, already escaped text.
    Text(Cow<'a, str>),
    /// A value still to be awaited. Once resolved, render it with
    /// [`Value::chunks_at`] at `indent`.
    Pending { pending: Pending, indent: usize },
}

/// Iterator over the chunks of a template or value, in document order.
///
/// Every call to [`Html::chunks`](super::Html::chunks) starts a fresh walk;
/// the template itself is never consumed.
pub struct Chunks<'a> {
    stack: Vec<Frame<'a>>,
}

enum Frame<'a> {
    /// `step` alternates literal (even) and value (odd) positions.
    Template {
        node: &'a Node,
        step: usize,
        base: usize,
        indent: usize,
    },
    List {
        items: &'a [Value],
        index: usize,
        indent: usize,
    },
}

enum Step<'a> {
    Exhausted,
    Text(Cow<'a, str>),
    Value(&'a Value, usize),
}

impl<'a> Frame<'a> {
    fn template(node: &'a Node, base: usize) -> Self {
        Frame::Template {
            node,
            step: 0,
            base,
            indent: base,
        }
    }

    fn advance(&mut self) -> Step<'a> {
        match self {
            Frame::Template {
                node,
                step,
                base,
                indent,
            } => {
                let node: &'a Node = *node;
                let at = *step;
                *step += 1;

                if at % 2 == 1 {
                    return match node.values.get(at / 2) {
                        Some(value) => Step::Value(value, *indent),
                        None => Step::Exhausted,
                    };
                }

                let i = at / 2;
                let Some(literal) = node.literals.get(i) else {
                    return Step::Exhausted;
                };
                if let Some(line) = line_indent(literal, node.min_indent, *base) {
                    *indent = line;
                }
                Step::Text(reindent(literal, node.min_indent, *base))
            }
            Frame::List {
                items,
                index,
                indent,
            } => {
                let items: &'a [Value] = *items;
                match items.get(*index) {
                    Some(item) => {
                        *index += 1;
                        Step::Value(item, *indent)
                    }
                    None => Step::Exhausted,
                }
            }
        }
    }
}

impl<'a> Chunks<'a> {
    pub(crate) fn template(node: &'a Node, base: usize) -> Self {
        Self {
            stack: vec![Frame::template(node, base)],
        }
    }

    pub(crate) fn value(value: &'a Value, indent: usize) -> Self {
        Self {
            stack: vec![Frame::List {
                items: std::slice::from_ref(value),
                index: 0,
                indent,
            }],
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.stack.len()
    }

    // Either yields a chunk for `value` directly or pushes a frame for it.
    fn enter(&mut self, value: &'a Value, indent: usize) -> Option<Chunk<'a>> {
        match value {
            Value::Null => None,
            Value::Text(text) => Some(Chunk::Text(escape(text))),
            Value::Unsafe(raw) => Some(Chunk::Text(Cow::Borrowed(raw.as_str()))),
            Value::Html(html) => {
                self.stack.push(Frame::template(&html.node, indent));
                None
            }
            Value::List(items) => {
                self.stack.push(Frame::List {
                    items,
                    index: 0,
                    indent,
                });
                None
            }
            Value::Pending(pending) => Some(Chunk::Pending {
                pending: pending.clone(),
                indent,
            }),
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        loop {
            let step = self.stack.last_mut()?.advance();
            let chunk = match step {
                Step::Exhausted => {
                    self.stack.pop();
                    continue;
                }
                Step::Text(text) => Some(Chunk::Text(text)),
                Step::Value(value, indent) => self.enter(value, indent),
            };

            match chunk {
                Some(Chunk::Text(text)) if text.is_empty() => continue,
                Some(chunk) => return Some(chunk),
                None => continue,
            }
        }
    }
}

/// Collects `chunks` into `out`, rendering already-resolved pending values in
/// place.
pub(crate) fn render_into(chunks: Chunks<'_>, out: &mut String) -> Result<(), TemplateError> {
    for chunk in chunks {
        match chunk {
            Chunk::Text(text) => out.push_str(&text),
            Chunk::Pending { pending, indent } => {
                let value = pending.peek().ok_or(TemplateError::Pending)?;
                render_into(value.chunks_at(indent), out)?;
            }
        }
    }
    Ok(())
}
