// crates/core/src/ast.rs
//! Template AST: the small closed union produced by the lenient parser.
//!
//! Nodes are built once when a category is loaded and are read-only
//! afterwards; the evaluator walks them depth-first.

use std::collections::HashMap;

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal text run (entities already decoded).
    Text(String),
    /// A paired tag with attributes and child nodes.
    Tag {
        name: String,
        attributes: HashMap<String, String>,
        children: Vec<Node>,
    },
    /// A self-closing tag such as `<star/>` or `<sr/>`.
    SelfClosing {
        name: String,
        attributes: HashMap<String, String>,
    },
}

impl Node {
    /// Tag name for `Tag`/`SelfClosing` nodes, `None` for text.
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Text(_) => None,
            Node::Tag { name, .. } | Node::SelfClosing { name, .. } => Some(name),
        }
    }

    /// Attribute lookup for `Tag`/`SelfClosing` nodes.
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Text(_) => None,
            Node::Tag { attributes, .. } | Node::SelfClosing { attributes, .. } => {
                attributes.get(key).map(String::as_str)
            }
        }
    }

    /// Child nodes (empty slice for text and self-closing nodes).
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Tag { children, .. } => children,
            _ => &[],
        }
    }

    /// Full attribute map for `Tag`/`SelfClosing` nodes.
    pub fn attributes(&self) -> Option<&HashMap<String, String>> {
        match self {
            Node::Text(_) => None,
            Node::Tag { attributes, .. } | Node::SelfClosing { attributes, .. } => Some(attributes),
        }
    }

    /// Concatenated literal text of this node and its descendants.
    ///
    /// Tags contribute only their children's text; attributes are ignored.
    /// Used where content must be read without evaluation (e.g. extracting
    /// a `<pattern>` from a learned category fragment).
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        collect_text(std::slice::from_ref(self), &mut out);
        out
    }

    /// Render this node back to markup, escaping text entities.
    ///
    /// The output re-parses to an equivalent tree; the learned-category
    /// store persists templates in this form.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        render_node(self, &mut out);
        out
    }
}

/// Concatenated literal text of a node list (see [`Node::inner_text`]).
pub fn nodes_inner_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

/// Render a node list back to markup.
pub fn nodes_to_markup(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, &mut out);
    }
    out
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Tag { children, .. } => collect_text(children, out),
            Node::SelfClosing { .. } => {}
        }
    }
}

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape_text(t)),
        Node::Tag {
            name,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(name);
            render_attributes(attributes, out);
            out.push('>');
            for child in children {
                render_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::SelfClosing { name, attributes } => {
            out.push('<');
            out.push_str(name);
            render_attributes(attributes, out);
            out.push_str("/>");
        }
    }
}

fn render_attributes(attributes: &HashMap<String, String>, out: &mut String) {
    // Sorted for a stable rendering; attribute order is not significant.
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();
    for key in keys {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(&attributes[key]));
        out.push('"');
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, children: Vec<Node>) -> Node {
        Node::Tag {
            name: name.to_string(),
            attributes: HashMap::new(),
            children,
        }
    }

    #[test]
    fn test_inner_text_skips_markup() {
        let node = tag(
            "template",
            vec![
                Node::Text("Hello ".to_string()),
                tag("b", vec![Node::Text("world".to_string())]),
                Node::SelfClosing {
                    name: "star".to_string(),
                    attributes: HashMap::new(),
                },
            ],
        );
        assert_eq!(node.inner_text(), "Hello world");
    }

    #[test]
    fn test_to_markup_round_trips_structure() {
        let mut attributes = HashMap::new();
        attributes.insert("index".to_string(), "2".to_string());
        let node = Node::Tag {
            name: "star".to_string(),
            attributes,
            children: vec![],
        };
        assert_eq!(node.to_markup(), "<star index=\"2\"></star>");
    }

    #[test]
    fn test_to_markup_escapes_text() {
        let node = Node::Text("a < b & c".to_string());
        assert_eq!(node.to_markup(), "a &lt; b &amp; c");
    }

    #[test]
    fn test_self_closing_markup() {
        let node = Node::SelfClosing {
            name: "sr".to_string(),
            attributes: HashMap::new(),
        };
        assert_eq!(node.to_markup(), "<sr/>");
    }
}
