//! Small tree-walking helpers shared by the section extractors.

use scraper::{ElementRef, Selector};

/// Parse a selector literal.
///
/// Only ever called with constant selectors from this crate.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

pub(crate) fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

pub(crate) fn is_tag(el: ElementRef<'_>, name: &str) -> bool {
    el.value().name() == name
}

/// Element children of `el`, in order.
pub(crate) fn child_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Every `tr` of a table, header rows included.
pub(crate) fn rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    table.select(&selector("tr")).collect()
}

/// The direct `td` cells of a row.
pub(crate) fn data_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    child_elements(row).filter(|c| is_tag(*c, "td")).collect()
}

/// The direct `th` and `td` cells of a row, in order.
pub(crate) fn all_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    child_elements(row)
        .filter(|c| is_tag(*c, "td") || is_tag(*c, "th"))
        .collect()
}

pub(crate) fn has_header_cell(row: ElementRef<'_>) -> bool {
    child_elements(row).any(|c| is_tag(c, "th"))
}

/// First following sibling element matching `pred`.
pub(crate) fn next_sibling_where<'a>(
    el: ElementRef<'a>, pred: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    el.next_siblings().filter_map(ElementRef::wrap).find(|e| pred(*e))
}

/// First element after `el` in document order matching `pred`.
///
/// Descendants of `el` count as following it, like a forward scan of the
/// source markup.
pub(crate) fn next_in_document<'a>(
    el: ElementRef<'a>, pred: impl Fn(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    let root = el.ancestors().last().unwrap_or(*el);
    root.descendants()
        .skip_while(|node| node.id() != el.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| pred(*e))
}

/// Nearest ancestor element with the given tag name.
pub(crate) fn ancestor_tag<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).find(|a| is_tag(*a, name))
}
