// ABOUTME: Visible-text extraction over the scraper tree with hidden-element and chrome skipping.
// ABOUTME: Iterative depth-first walk; nodes excluded by id are skipped with their subtrees.

use std::collections::HashSet;

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose text never reaches the reader.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "object", "canvas",
];

/// Elements that break words apart when rendered.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Utility classes used to hide content visually.
const HIDDEN_CLASSES: &[&str] = &["hidden", "d-none", "sr-only", "visually-hidden", "invisible"];

static HIDDEN_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden|opacity\s*:\s*0(?:\.0+)?\s*(?:;|!|$)")
        .expect("hidden style pattern must compile")
});

/// True if the element is hidden by attribute, inline style, or utility class.
pub fn is_hidden(el: &Element) -> bool {
    if el.attr("hidden").is_some() {
        return true;
    }
    if el
        .attr("aria-hidden")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return true;
    }
    if let Some(style) = el.attr("style") {
        if HIDDEN_STYLE_RE.is_match(style) {
            return true;
        }
    }
    el.classes().any(|c| HIDDEN_CLASSES.contains(&c))
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ids of every element matching any of the selectors.
pub fn collect_ids(doc: &Html, selectors: &[&Selector]) -> HashSet<NodeId> {
    let mut ids = HashSet::new();
    for sel in selectors {
        for el in doc.select(sel) {
            ids.insert(el.id());
        }
    }
    ids
}

/// True if the element or any ancestor is in `exclude`.
pub fn is_excluded(el: ElementRef, exclude: &HashSet<NodeId>) -> bool {
    exclude.contains(&el.id()) || el.ancestors().any(|a| exclude.contains(&a.id()))
}

enum Visit<'a> {
    Enter(NodeRef<'a, Node>),
    Exit,
}

/// Visible text under `root`.
pub fn visible_text(root: ElementRef) -> String {
    visible_text_excluding(root, &HashSet::new())
}

/// Visible text under `root`, skipping the subtrees rooted at `exclude`.
pub fn visible_text_excluding(root: ElementRef, exclude: &HashSet<NodeId>) -> String {
    let mut out = String::new();
    let mut stack: Vec<Visit> = vec![Visit::Enter(*root)];

    while let Some(visit) = stack.pop() {
        let node = match visit {
            Visit::Enter(node) => node,
            Visit::Exit => {
                out.push(' ');
                continue;
            }
        };
        if exclude.contains(&node.id()) {
            continue;
        }
        match node.value() {
            Node::Text(t) => out.push_str(&**t),
            Node::Element(el) => {
                let name = el.name();
                if SKIP_TAGS.contains(&name) || is_hidden(el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push(' ');
                    stack.push(Visit::Exit);
                }
                let children: Vec<_> = node.children().collect();
                for child in children.into_iter().rev() {
                    stack.push(Visit::Enter(child));
                }
            }
            Node::Document | Node::Fragment => {
                let children: Vec<_> = node.children().collect();
                for child in children.into_iter().rev() {
                    stack.push(Visit::Enter(child));
                }
            }
            _ => {}
        }
    }

    normalize_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_text(html: &str) -> String {
        let doc = Html::parse_document(html);
        let body = Selector::parse("body").unwrap();
        visible_text(doc.select(&body).next().unwrap())
    }

    #[test]
    fn skips_scripts_styles_and_hidden() {
        let text = body_text(
            r#"<body>
                <p>Visible one.</p>
                <script>var x = 1;</script>
                <style>.a { color: red }</style>
                <div hidden>attr hidden</div>
                <div aria-hidden="true">aria hidden</div>
                <div style="display: none">styled hidden</div>
                <div style="opacity:0;">transparent</div>
                <span class="sr-only">screen reader</span>
                <p>Visible <b>two</b>.</p>
            </body>"#,
        );
        assert_eq!(text, "Visible one. Visible two.");
    }

    #[test]
    fn inline_elements_do_not_split_words() {
        assert_eq!(body_text("<body><p>foo<b>bar</b></p><p>baz</p></body>"), "foobar baz");
    }

    #[test]
    fn excluded_subtrees_are_skipped() {
        let doc = Html::parse_document(
            "<body><nav>Home About</nav><main><p>Real content</p></main></body>",
        );
        let nav = Selector::parse("nav").unwrap();
        let body = Selector::parse("body").unwrap();
        let ids = collect_ids(&doc, &[&nav]);
        let text = visible_text_excluding(doc.select(&body).next().unwrap(), &ids);
        assert_eq!(text, "Real content");
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let depth = 5_000;
        let html = format!(
            "<body>{}deep{}</body>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        assert_eq!(body_text(&html), "deep");
    }

    #[test]
    fn opacity_zero_point_five_is_visible() {
        assert_eq!(
            body_text(r#"<body><p style="opacity: 0.5">faded</p></body>"#),
            "faded"
        );
    }
}
