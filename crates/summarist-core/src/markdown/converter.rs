use std::sync::OnceLock;

use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};

/// Recursion limit; deeper subtrees are flattened to plain text
const MAX_DEPTH: usize = 256;

/// Indentation unit for nested list items
const INDENT: &str = "  ";

fn blank_runs() -> &'static Regex {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"))
}

/// Convert article HTML into compact Markdown-like text for LLM input.
///
/// Never fails: the HTML parser recovers from malformed markup and anything it
/// cannot make sense of is dropped. Links keep only their text, images only
/// their alt text. Headings, links and emphasis convert their first child
/// only, so trailing inline siblings inside them are not emitted.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut markdown = String::new();

    if let Some(body) = find_body(&document) {
        for child in body.children() {
            markdown.push_str(&convert_node(child, 0, 0));
        }
    }

    collapse_blank_lines(&markdown)
}

/// Collapse any run of three or more newlines into exactly two
pub fn collapse_blank_lines(text: &str) -> String {
    blank_runs().replace_all(text, "\n\n").into_owned()
}

fn find_body(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
}

fn convert_node(node: NodeRef<'_, Node>, indent: usize, depth: usize) -> String {
    if depth >= MAX_DEPTH {
        return flatten_text(node);
    }

    match node.value() {
        Node::Text(text) => convert_text(node, text),
        Node::Element(element) => convert_element(node, element, indent, depth),
        _ => String::new(),
    }
}

fn convert_element(
    node: NodeRef<'_, Node>,
    element: &Element,
    indent: usize,
    depth: usize,
) -> String {
    let name = element.name();

    if let Some(level) = heading_level(name) {
        return format!(
            "{} {}\n\n",
            "#".repeat(level),
            convert_first_child(node, indent, depth)
        );
    }

    match name {
        "p" | "div" => {
            let mut out = convert_children(node, indent, depth);
            out.push_str("\n\n");
            out
        }
        "a" => format!("`{}`", convert_first_child(node, indent, depth)),
        "img" => format!("img: `{}`", element.attr("alt").unwrap_or("")),
        "strong" | "b" => format!("**{}**", convert_first_child(node, indent, depth)),
        "em" | "i" => format!("*{}*", convert_first_child(node, indent, depth)),
        "ul" | "ol" => {
            let mut out = String::from("\n");
            for item in node.children() {
                let is_item = item
                    .value()
                    .as_element()
                    .is_some_and(|e| e.name() == "li");
                if is_item {
                    out.push_str(&list_item(item, indent, depth + 1));
                }
            }
            out.push('\n');
            out
        }
        "li" => list_item(node, indent, depth),
        "br" => "\n".to_string(),
        "audio" | "video" => {
            let alt = element.attr("alt").filter(|alt| !alt.is_empty());
            format!("[{}]", alt.unwrap_or("Media"))
        }
        _ => convert_children(node, indent, depth),
    }
}

fn list_item(item: NodeRef<'_, Node>, indent: usize, depth: usize) -> String {
    format!(
        "{}- {}\n",
        INDENT.repeat(indent),
        convert_children(item, indent + 1, depth)
    )
}

fn convert_children(node: NodeRef<'_, Node>, indent: usize, depth: usize) -> String {
    node.children()
        .map(|child| convert_node(child, indent, depth + 1))
        .collect()
}

fn convert_first_child(node: NodeRef<'_, Node>, indent: usize, depth: usize) -> String {
    let Some(child) = node.first_child() else {
        return String::new();
    };

    match child.value() {
        // Siblings are not emitted here, so no separating space is kept
        Node::Text(text) => text.trim_matches(is_markup_space).to_string(),
        _ => convert_node(child, indent, depth + 1),
    }
}

fn convert_text(node: NodeRef<'_, Node>, raw: &str) -> String {
    let trimmed = raw.trim_matches(is_markup_space);
    if trimmed.is_empty() {
        return String::new();
    }

    // Keep a single separating space next to inline siblings
    let mut out = String::with_capacity(trimmed.len() + 2);
    if raw.starts_with(is_markup_space) && has_content(node.prev_siblings()) {
        out.push(' ');
    }
    out.push_str(trimmed);
    if raw.ends_with(is_markup_space) && has_content(node.next_siblings()) {
        out.push(' ');
    }
    out
}

fn has_content<'a>(mut siblings: impl Iterator<Item = NodeRef<'a, Node>>) -> bool {
    siblings.any(|n| match n.value() {
        Node::Element(_) => true,
        Node::Text(text) => !text.trim_matches(is_markup_space).is_empty(),
        _ => false,
    })
}

fn flatten_text(node: NodeRef<'_, Node>) -> String {
    node.descendants()
        .filter_map(|n| n.value().as_text().map(|t| &**t))
        .map(|t| t.trim_matches(is_markup_space))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Whitespace stripped around text nodes. Non-breaking spaces are content.
fn is_markup_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B')
}
