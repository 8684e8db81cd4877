// crates/core/src/template.rs
//! Lenient recursive-descent parser for template markup.
//!
//! The parser never rejects input. Malformed markup degrades to literal
//! text: an unclosed tag re-appears verbatim in the output, a stray `<`
//! stays a `<`. Standard XML entities are decoded in text runs and
//! attribute values; CDATA sections pass through verbatim.

use crate::ast::Node;
use memchr::memchr;
use std::collections::HashMap;
use tracing::debug;

/// Tags that are never paired; a bare `<name>` without the closing slash is
/// still treated as self-closing. `that` is absent: it is paired inside
/// category fragments (`<that>PATTERN</that>`).
const VOID_TAGS: &[&str] = &[
    "star", "sr", "input", "request", "response", "loop", "date", "time", "id", "size",
];

/// Parse template source into a node list.
pub fn parse_template(src: &str) -> Vec<Node> {
    let mut parser = Parser { src, pos: 0 };
    let (nodes, _) = parser.parse_nodes(None);
    nodes
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

struct TagHeader {
    name: String,
    attributes: HashMap<String, String>,
    self_closing: bool,
    /// Byte offset one past the closing `>`.
    end: usize,
}

impl<'a> Parser<'a> {
    /// Parse nodes until EOF or until the closing tag named by `until`.
    /// Returns the nodes and whether the expected close was found.
    fn parse_nodes(&mut self, until: Option<&str>) -> (Vec<Node>, bool) {
        let mut nodes: Vec<Node> = Vec::new();
        let mut text = String::new();

        loop {
            let rest = &self.src[self.pos..];
            let lt = match memchr(b'<', rest.as_bytes()) {
                Some(i) => i,
                None => {
                    text.push_str(rest);
                    self.pos = self.src.len();
                    flush_text(&mut text, &mut nodes);
                    return (nodes, false);
                }
            };
            text.push_str(&rest[..lt]);
            self.pos += lt;
            let rest = &self.src[self.pos..];

            if rest.starts_with("<!--") {
                match rest.find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => self.pos = self.src.len(),
                }
                continue;
            }

            if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
                flush_text(&mut text, &mut nodes);
                match cdata.find("]]>") {
                    Some(end) => {
                        nodes.push(Node::Text(cdata[..end].to_string()));
                        self.pos += 9 + end + 3;
                    }
                    None => {
                        nodes.push(Node::Text(cdata.to_string()));
                        self.pos = self.src.len();
                    }
                }
                continue;
            }

            if let Some(close) = rest.strip_prefix("</") {
                match close.find('>') {
                    Some(end) => {
                        let name = close[..end].trim().to_ascii_lowercase();
                        if until == Some(name.as_str()) {
                            self.pos += 2 + end + 1;
                            flush_text(&mut text, &mut nodes);
                            return (nodes, true);
                        }
                        // Stray close: keep it as literal text.
                        text.push_str(&rest[..2 + end + 1]);
                        self.pos += 2 + end + 1;
                    }
                    None => {
                        text.push('<');
                        self.pos += 1;
                    }
                }
                continue;
            }

            match self.parse_tag_header() {
                Some(header) => {
                    let header_src = &self.src[self.pos..header.end];
                    self.pos = header.end;
                    if header.self_closing || VOID_TAGS.contains(&header.name.as_str()) {
                        flush_text(&mut text, &mut nodes);
                        nodes.push(Node::SelfClosing {
                            name: header.name,
                            attributes: header.attributes,
                        });
                        continue;
                    }
                    let (children, closed) = self.parse_nodes(Some(&header.name));
                    flush_text(&mut text, &mut nodes);
                    if closed {
                        nodes.push(Node::Tag {
                            name: header.name,
                            attributes: header.attributes,
                            children,
                        });
                    } else {
                        // Missing close: the open tag appears literally,
                        // followed by whatever parsed after it.
                        debug!(tag = %header_src, "unclosed tag degraded to text");
                        nodes.push(Node::Text(header_src.to_string()));
                        nodes.extend(children);
                    }
                }
                None => {
                    // Not a parsable tag; `<` stays literal.
                    text.push('<');
                    self.pos += 1;
                }
            }
        }
    }

    /// Parse `<name attr="v" …>` or `<name …/>` at `self.pos`. Does not
    /// advance the cursor; the caller jumps to `TagHeader::end`.
    fn parse_tag_header(&self) -> Option<TagHeader> {
        let bytes = self.src.as_bytes();
        let mut i = self.pos + 1;
        let start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == start || !bytes[start].is_ascii_alphabetic() {
            return None;
        }
        let name = self.src[start..i].to_ascii_lowercase();
        let mut attributes = HashMap::new();

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            match bytes[i] {
                b'>' => {
                    return Some(TagHeader {
                        name,
                        attributes,
                        self_closing: false,
                        end: i + 1,
                    });
                }
                b'/' => {
                    if bytes.get(i + 1) == Some(&b'>') {
                        return Some(TagHeader {
                            name,
                            attributes,
                            self_closing: true,
                            end: i + 2,
                        });
                    }
                    return None;
                }
                _ => {
                    let attr_start = i;
                    while i < bytes.len() && is_name_byte(bytes[i]) {
                        i += 1;
                    }
                    if i == attr_start {
                        return None;
                    }
                    let attr_name = self.src[attr_start..i].to_ascii_lowercase();
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    let mut value = String::new();
                    if bytes.get(i) == Some(&b'=') {
                        i += 1;
                        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                            i += 1;
                        }
                        match bytes.get(i) {
                            Some(&q @ (b'"' | b'\'')) => {
                                i += 1;
                                let vstart = i;
                                while i < bytes.len() && bytes[i] != q {
                                    i += 1;
                                }
                                if i >= bytes.len() {
                                    return None;
                                }
                                value = decode_entities(&self.src[vstart..i]);
                                i += 1;
                            }
                            Some(_) => {
                                let vstart = i;
                                while i < bytes.len()
                                    && !bytes[i].is_ascii_whitespace()
                                    && bytes[i] != b'>'
                                    && bytes[i] != b'/'
                                {
                                    i += 1;
                                }
                                value = decode_entities(&self.src[vstart..i]);
                            }
                            None => return None,
                        }
                    }
                    attributes.insert(attr_name, value);
                }
            }
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn flush_text(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(decode_entities(text)));
        text.clear();
    }
}

/// Decode the five standard XML entities in a single pass. Unrecognized
/// entity-like sequences stay literal.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(entity, _)| tail.starts_with(entity));
        match decoded {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
