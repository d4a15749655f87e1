//! Markup parser – turns a controlled HTML subset into a simple node tree
//! that [`crate::surface::SceneSurface`] builds its element arena from.
//!
//! Only element structure matters here: tag names are lowercased, attribute
//! values are entity-decoded strings, and text is skipped because it carries
//! no geometry. Void elements (`img`, `input`, `br`, `hr`, `meta`, `link`)
//! never take children.

use std::collections::HashMap;

const VOID_ELEMENTS: &[&str] = &["img", "input", "br", "hr", "meta", "link"];

/// An element carrying tag, attributes, and child elements.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }
}

/// Parse markup into a list of top-level elements.
///
/// Unclosed elements are closed at end of input; stray closing tags end the
/// current element. Comments, doctypes and processing instructions are dropped.
pub fn parse_html(html: &str) -> Vec<ElementNode> {
    let mut parser = Parser { input: html, pos: 0 };
    let mut nodes = parser.nodes();
    while !parser.eof() {
        parser.skip_past(">");
        nodes.extend(parser.nodes());
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn nodes(&mut self) -> Vec<ElementNode> {
        let mut nodes = Vec::new();
        while !self.eof() && !self.rest().starts_with("</") {
            if let Some(node) = self.node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn node(&mut self) -> Option<ElementNode> {
        let rest = self.rest();
        if rest.starts_with("<!--") {
            self.skip_past("-->");
            None
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            self.skip_past(">");
            None
        } else if rest.starts_with('<') {
            Some(self.element())
        } else {
            self.skip_text();
            None
        }
    }

    fn skip_text(&mut self) {
        self.pos += self.rest().find('<').unwrap_or(self.rest().len());
    }

    fn element(&mut self) -> ElementNode {
        self.pos += 1; // '<'
        let mut elem = ElementNode::new(self.name());

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() || rest.starts_with('>') || rest.starts_with("/>") {
                break;
            }
            let key = self.name();
            if key.is_empty() {
                // Unparseable attribute character; skip it.
                self.bump_char();
                continue;
            }
            let value = self.attribute_value();
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.rest().starts_with("/>") {
            self.pos += 2;
            return elem;
        }
        if self.rest().starts_with('>') {
            self.pos += 1;
        }
        if elem.is_void() {
            return elem;
        }

        elem.children = self.nodes();

        if self.rest().starts_with("</") {
            self.skip_past(">");
        }
        elem
    }

    fn name(&mut self) -> String {
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == ':'))
            .unwrap_or(self.rest().len());
        let name = self.rest()[..len].to_string();
        self.pos += len;
        name
    }

    fn attribute_value(&mut self) -> String {
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return String::new();
        }
        self.pos += 1;
        self.skip_whitespace();

        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let len = self
                    .rest()
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(self.rest().len());
                let value = self.rest()[..len].trim_end_matches('/').to_string();
                self.pos += len;
                return value;
            }
        };
        self.pos += 1;
        let len = self.rest().find(quote).unwrap_or(self.rest().len());
        let value = decode_entities(&self.rest()[..len]);
        self.pos = (self.pos + len + 1).min(self.input.len());
        value
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_past(&mut self, marker: &str) {
        match self.rest().find(marker) {
            Some(idx) => self.pos += idx + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn bump_char(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[ElementNode]) -> Vec<ElementNode> {
    for e in nodes {
        if e.tag == "body" {
            return e.children.clone();
        }
        if e.tag == "html" {
            let inner = body_children(&e.children);
            if !inner.is_empty() {
                return inner;
            }
        }
    }
    nodes.to_vec()
}
