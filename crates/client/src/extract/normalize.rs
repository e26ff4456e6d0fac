//! Text normalization for wiki markup fragments.
//!
//! Every extractor funnels cell text through here so that whitespace, the
//! "（+）" potential marker and inline hint spans are handled the same way
//! everywhere.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

/// Annotation the wiki appends to values that grow with potential.
pub const PLUS_MARKER: &str = "（+）";

/// Inline styles of spans that carry hints rather than content: the blue and
/// green formula hints and hidden spans.
const NOISE_STYLES: &[&str] = &["color:#0098dc", "color:green", "color:#007dfa", "display:none"];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static INLINE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("valid regex"));

/// Anything the normalizer accepts: a raw string, a parsed element, or
/// nothing at all.
#[derive(Debug, Clone, Copy)]
pub enum Fragment<'a> {
    Empty,
    Text(&'a str),
    Node(ElementRef<'a>),
}

impl<'a> From<&'a str> for Fragment<'a> {
    fn from(s: &'a str) -> Self {
        Fragment::Text(s)
    }
}

impl<'a> From<&'a String> for Fragment<'a> {
    fn from(s: &'a String) -> Self {
        Fragment::Text(s.as_str())
    }
}

impl<'a> From<ElementRef<'a>> for Fragment<'a> {
    fn from(el: ElementRef<'a>) -> Self {
        Fragment::Node(el)
    }
}

impl<'a, T: Into<Fragment<'a>>> From<Option<T>> for Fragment<'a> {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Fragment::Empty, Into::into)
    }
}

/// Normalization switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Keep the "（+）" marker instead of stripping it.
    pub keep_plus: bool,
    /// Turn `<br>` into newlines and keep line structure.
    pub line_breaks: bool,
    /// Skip hint and hidden spans before reading text.
    pub strip_noise: bool,
    /// Skip hidden elements at any depth, keep hint spans.
    pub skip_hidden: bool,
}

/// Plain text of a fragment with default options.
pub fn clean_text<'a>(fragment: impl Into<Fragment<'a>>) -> String {
    clean_text_with(fragment, CleanOptions::default())
}

/// Plain text of a description cell: hint and hidden spans removed first.
pub fn clean_desc<'a>(fragment: impl Into<Fragment<'a>>) -> String {
    clean_text_with(fragment, CleanOptions { strip_noise: true, ..Default::default() })
}

/// Plain text of a fragment.
///
/// Text nodes are trimmed and joined the way the wiki renders adjacent
/// inline elements; whitespace runs then collapse to one space (or, with
/// `line_breaks`, horizontal runs to one space and line runs to one newline).
pub fn clean_text_with<'a>(fragment: impl Into<Fragment<'a>>, opts: CleanOptions) -> String {
    let raw = match fragment.into() {
        Fragment::Empty => return String::new(),
        Fragment::Text(s) => s.to_string(),
        Fragment::Node(el) => {
            let mut parts = Vec::new();
            collect_text(el, opts, &mut parts);
            parts.join(if opts.line_breaks { "\n" } else { "" })
        }
    };

    let mut text = if opts.line_breaks {
        let inline = INLINE_WHITESPACE.replace_all(&raw, " ");
        LINE_BREAKS.replace_all(&inline, "\n").into_owned()
    } else {
        WHITESPACE.replace_all(&raw, " ").into_owned()
    };

    if !opts.keep_plus {
        text = text.replace(PLUS_MARKER, "");
    }

    text.trim().to_string()
}

fn collect_text(el: ElementRef<'_>, opts: CleanOptions, parts: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => {
                let trimmed = t.text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else { continue };
                if opts.line_breaks && child_el.value().name() == "br" {
                    parts.push("\n".to_string());
                    continue;
                }
                if opts.strip_noise && is_noise_span(child_el) {
                    continue;
                }
                if opts.skip_hidden && is_hidden(child_el) {
                    continue;
                }
                collect_text(child_el, opts, parts);
            }
            _ => {}
        }
    }
}

fn style_of(el: ElementRef<'_>) -> String {
    el.value()
        .attr("style")
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// `true` for spans whose inline style hides them.
pub fn is_hidden(el: ElementRef<'_>) -> bool {
    style_of(el).contains("display:none")
}

/// `true` for hint spans and hidden spans.
pub fn is_noise_span(el: ElementRef<'_>) -> bool {
    if el.value().name() != "span" {
        return false;
    }
    let style = style_of(el);
    NOISE_STYLES.iter().any(|noise| style.contains(noise))
}
