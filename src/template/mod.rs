//! Streaming HTML templates.
//!
//! A template is built with the [`html!`](crate::html) macro, which takes
//! literal segments and interpolated values in alternation:
//!
//! ```
//! use weft::{html, unsafe_html};
//!
//! let name = "<Ferris>";
//! let page = html!("<p>Hello ", name, "! ", unsafe_html("<b>welcome</b>"), "</p>");
//!
//! assert_eq!(
//!     page.render().unwrap(),
//!     "<p>Hello &lt;Ferris&gt;! <b>welcome</b></p>"
//! );
//! ```
//!
//! Nothing is rendered at construction time. An [`Html`] node can be
//! rendered to a `String` ([`Html::render`]), walked as a sequence of
//! [`Chunk`]s ([`Html::chunks`]), or written straight into an async sink
//! ([`Html::write_to`]). All three paths share one traversal, so they always
//! agree on the output.
//!
//! Interpolated text is escaped; literal segments are trusted and written as
//! they are, apart from the indentation rewriting described in [`indent`].

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::error::TemplateError;

mod cursor;
pub mod indent;
mod writer;

pub use cursor::{Chunk, Chunks};
pub use writer::write_html;

/// Builds an [`Html`] node from alternating literals and values.
///
/// The first and last arguments are string literals; every expression in
/// between is converted with [`Value::from`]. Because the arguments
/// alternate, the node always has exactly one more literal than values.
///
/// ```
/// use weft::html;
///
/// let items = vec![html!("<li>one</li>"), html!("<li>two</li>")];
/// let list = html!("<ul>", items, "</ul>");
/// assert_eq!(list.render().unwrap(), "<ul><li>one</li><li>two</li></ul>");
/// ```
#[macro_export]
macro_rules! html {
    ($first:literal $(, $value:expr, $literal:literal)*) => {
        $crate::template::Html::from_parts(
            ::std::vec![
                ::std::borrow::Cow::Borrowed($first)
                $(, ::std::borrow::Cow::Borrowed($literal))*
            ],
            ::std::vec![$($crate::template::Value::from($value)),*],
        )
    };
}

/// An immutable, lazily rendered HTML template.
///
/// Cloning is cheap: the literal and value lists live behind an [`Arc`].
#[derive(Clone)]
pub struct Html {
    node: Arc<Node>,
}

pub(crate) struct Node {
    pub(crate) literals: Vec<Cow<'static, str>>,
    pub(crate) values: Vec<Value>,
    pub(crate) min_indent: usize,
}

impl Html {
    /// Creates a node from its literal segments and values.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Arity`] unless there is exactly one more
    /// literal than there are values.
    pub fn new(
        literals: Vec<Cow<'static, str>>,
        values: Vec<Value>,
    ) -> Result<Self, TemplateError> {
        if literals.len() != values.len() + 1 {
            return Err(TemplateError::Arity {
                literals: literals.len(),
                values: values.len(),
            });
        }
        Ok(Self::from_parts(literals, values))
    }

    /// Constructor behind [`html!`](crate::html), whose grammar already
    /// guarantees the literal/value arity.
    #[doc(hidden)]
    pub fn from_parts(literals: Vec<Cow<'static, str>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(literals.len(), values.len() + 1);
        let min_indent = indent::min_indent(&literals);
        Self {
            node: Arc::new(Node {
                literals,
                values,
                min_indent,
            }),
        }
    }

    pub fn literals(&self) -> &[Cow<'static, str>] {
        &self.node.literals
    }

    pub fn values(&self) -> &[Value] {
        &self.node.values
    }

    /// Renders the whole template into a string at indent level 0.
    ///
    /// Pending values that already resolved are rendered in place.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Pending`] when a pending value has not
    /// resolved yet; await it through [`Html::write_to`] instead.
    pub fn render(&self) -> Result<String, TemplateError> {
        self.render_indented(0)
    }

    /// Renders the template with every rewritten line indented by `base`
    /// spaces.
    pub fn render_indented(&self, base: usize) -> Result<String, TemplateError> {
        let mut out = String::new();
        cursor::render_into(self.chunks_at(base), &mut out)?;
        Ok(out)
    }

    /// Walks the template as a sequence of chunks in document order.
    pub fn chunks(&self) -> Chunks<'_> {
        self.chunks_at(0)
    }

    pub fn chunks_at(&self, base: usize) -> Chunks<'_> {
        Chunks::template(&self.node, base)
    }

    /// Streams the template into `sink`, buffering until `threshold` bytes
    /// are pending. See [`write_html`].
    pub async fn write_to<W>(&self, sink: &mut W, threshold: usize) -> std::io::Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin + Send + ?Sized,
    {
        write_html(self, sink, threshold).await
    }
}

impl fmt::Debug for Html {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Html")
            .field("literals", &self.node.literals)
            .field("values", &self.node.values)
            .finish()
    }
}

/// One interpolated value.
#[derive(Clone, Debug)]
pub enum Value {
    /// Renders as nothing.
    Null,
    /// Text that is escaped on output.
    Text(Cow<'static, str>),
    Html(Html),
    /// Rendered element by element, without separators.
    List(Vec<Value>),
    /// Raw markup that bypasses escaping.
    Unsafe(Unsafe),
    /// A value that resolves later.
    Pending(Pending),
}

impl Value {
    /// Converts anything printable into escaped text.
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Text(Cow::Owned(value.to_string()))
    }

    /// Wraps a future whose output is interpolated once it resolves.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Into<Value>,
    {
        Self::Pending(Pending::new(future))
    }

    /// Walks this value as a chunk sequence rendered at `indent`.
    pub fn chunks_at(&self, indent: usize) -> Chunks<'_> {
        Chunks::value(self, indent)
    }

    /// Renders this value to a string at `indent`.
    pub fn render_indented(&self, indent: usize) -> Result<String, TemplateError> {
        let mut out = String::new();
        cursor::render_into(self.chunks_at(indent), &mut out)?;
        Ok(out)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(Cow::Owned(s.to_owned()))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::Text(Cow::Owned(s.clone()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(Cow::Owned(s))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(s: Cow<'static, str>) -> Self {
        Self::Text(s)
    }
}

impl From<Html> for Value {
    fn from(html: Html) -> Self {
        Self::Html(html)
    }
}

impl From<&Html> for Value {
    fn from(html: &Html) -> Self {
        Self::Html(html.clone())
    }
}

impl From<Unsafe> for Value {
    fn from(raw: Unsafe) -> Self {
        Self::Unsafe(raw)
    }
}

impl From<Pending> for Value {
    fn from(pending: Pending) -> Self {
        Self::Pending(pending)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::List(iter.into_iter().map(Into::into).collect())
    }
}

macro_rules! display_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::display(value)
                }
            }
        )*
    };
}

display_values!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
);

/// Markup that is emitted without escaping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsafe(Cow<'static, str>);

impl Unsafe {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Marks `raw` as trusted markup that bypasses escaping.
pub fn unsafe_html(raw: impl Into<Cow<'static, str>>) -> Unsafe {
    Unsafe(raw.into())
}

/// A value that is not available yet.
///
/// The underlying future is shared, so the template that holds it can be
/// rendered more than once; every render observes the same resolved value.
#[derive(Clone)]
pub struct Pending {
    state: PendingState,
}

#[derive(Clone)]
enum PendingState {
    Ready(Box<Value>),
    Waiting(Shared<BoxFuture<'static, Value>>),
}

impl Pending {
    pub fn new<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Into<Value>,
    {
        Self {
            state: PendingState::Waiting(future.map(Into::into).boxed().shared()),
        }
    }

    /// A pending value that is already resolved.
    pub fn ready(value: impl Into<Value>) -> Self {
        Self {
            state: PendingState::Ready(Box::new(value.into())),
        }
    }

    /// Returns the resolved value without waiting, if there is one.
    pub fn peek(&self) -> Option<&Value> {
        match &self.state {
            PendingState::Ready(value) => Some(value.as_ref()),
            PendingState::Waiting(shared) => shared.peek(),
        }
    }

    /// Waits for the value.
    pub async fn resolve(&self) -> Value {
        match &self.state {
            PendingState::Ready(value) => (**value).clone(),
            PendingState::Waiting(shared) => shared.clone().await,
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("resolved", &self.peek().is_some())
            .finish()
    }
}

/// Escapes the five HTML-significant characters.
///
/// Returns the input unchanged (and unallocated) when nothing needs escaping.
///
/// ```
/// use weft::template::escape;
///
/// assert_eq!(escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
///     "&lt;a href=&quot;x&quot;&gt;Tom &amp; &apos;Jerry&apos;&lt;/a&gt;");
/// ```
pub fn escape(input: &str) -> Cow<'_, str> {
    let Some(first) = input.find(['&', '<', '>', '"', '\'']) else {
        return Cow::Borrowed(input);
    };

    let mut out = String::with_capacity(input.len() + 16);
    out.push_str(&input[..first]);
    for c in input[first..].chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;

    #[test]
    fn escapes_interpolated_text() {
        let page = html!("<p>", "<b>", "</p>");
        assert_eq!(page.render().unwrap(), "<p>&lt;b&gt;</p>");
    }

    #[test]
    fn escape_covers_all_five_characters() {
        assert_eq!(escape("&<>\"'"), "&amp;&lt;&gt;&quot;&apos;");
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn literals_are_not_escaped() {
        let page = html!("<a href='/'>home</a>");
        assert_eq!(page.render().unwrap(), "<a href='/'>home</a>");
    }

    #[test]
    fn unsafe_values_bypass_escaping() {
        let page = html!("<div>", unsafe_html("<b>bold</b>"), "</div>");
        assert_eq!(page.render().unwrap(), "<div><b>bold</b></div>");
    }

    #[test]
    fn coerces_primitives_and_nulls() {
        let missing: Option<&str> = None;
        let page = html!("", 42, " ", 1.5, " ", true, " ", missing, "|", (), "");
        assert_eq!(page.render().unwrap(), "42 1.5 true |");
    }

    #[test]
    fn display_values_are_escaped() {
        let page = html!("<i>", Value::display(format_args!("{}<{}", 1, 2)), "</i>");
        assert_eq!(page.render().unwrap(), "<i>1&lt;2</i>");
    }

    #[test]
    fn lists_concatenate_without_separator() {
        let names = ["a", "<b>", "c"];
        let page = html!("[", names, "]");
        assert_eq!(page.render().unwrap(), "[a&lt;b&gt;c]");

        let doubled: Value = (1..=3).map(|n| n * 2).collect();
        let page = html!("", doubled, "");
        assert_eq!(page.render().unwrap(), "246");
    }

    #[test]
    fn nested_templates_render_in_place() {
        let inner = html!("<span>", "x&y", "</span>");
        let outer = html!("<p>", inner, "</p>");
        assert_eq!(outer.render().unwrap(), "<p><span>x&amp;y</span></p>");
    }

    #[test]
    fn new_rejects_wrong_arity() {
        let err = Html::new(vec![Cow::Borrowed("a")], vec![Value::Null]).unwrap_err();
        assert_eq!(err, TemplateError::Arity { literals: 1, values: 1 });

        let ok = Html::new(
            vec![Cow::Borrowed("a"), Cow::Borrowed("c")],
            vec![Value::from("b")],
        )
        .unwrap();
        assert_eq!(ok.render().unwrap(), "abc");
    }

    #[test]
    fn render_is_idempotent() {
        let page = html!("\n  <ul>\n    ", vec![html!("<li>1</li>")], "\n  </ul>\n");
        let first = page.render().unwrap();
        assert_eq!(page.render().unwrap(), first);
        assert_eq!(page.literals().len(), page.values().len() + 1);
    }

    #[test]
    fn render_matches_chunk_concatenation() {
        let page = html!(
            "<main>\n  ",
            vec![html!("<h1>", "T&C", "</h1>"), html!("\n  <p>\n    ", 7, "\n  </p>")],
            "\n  ",
            unsafe_html("<hr>"),
            "\n</main>"
        );
        let joined: String = page
            .chunks()
            .map(|chunk| match chunk {
                Chunk::Text(text) => text.into_owned(),
                Chunk::Pending { .. } => panic!("no pending values here"),
            })
            .collect();
        assert_eq!(page.render().unwrap(), joined);
    }

    #[test]
    fn unresolved_pending_value_faults() {
        let page = html!("<p>", Value::pending(std::future::pending::<String>()), "</p>");
        assert_eq!(page.render(), Err(TemplateError::Pending));
    }

    #[test]
    fn ready_pending_value_renders() {
        let page = html!("<p>", Pending::ready("<now>"), "</p>");
        assert_eq!(page.render().unwrap(), "<p>&lt;now&gt;</p>");
    }

    #[tokio::test]
    async fn resolved_pending_value_renders_after_await() {
        let pending = Pending::new(async { html!("<b>", "done", "</b>") });
        let page = html!("<p>", pending.clone(), "</p>");
        assert!(page.render().is_err());

        pending.resolve().await;
        assert_eq!(page.render().unwrap(), "<p><b>done</b></p>");
    }
}
