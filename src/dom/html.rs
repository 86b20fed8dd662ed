//! HTML escaping, rich-text formatting and a small fragment parser
//!
//! The parser understands the subset the engine and its tests need: nested
//! elements with attributes, void elements, comments, and character
//! references. It never fails; malformed markup degrades to text.

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Escape the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape `text` and keep its whitespace visible in a rich-text surface:
/// newlines become `<br>`, double spaces and tabs become `&nbsp;` runs.
pub fn format_for_rich_text(text: &str) -> String {
    escape_html(text)
        .replace('\n', "<br>")
        .replace("  ", "&nbsp;&nbsp;")
        .replace('\t', "&nbsp;&nbsp;&nbsp;&nbsp;")
}

/// Whether plain text would lose visible whitespace if inserted as a bare text node
pub fn needs_markup(text: &str) -> bool {
    text.contains('\n') || text.contains('\t') || text.contains("  ")
}

/// Parsed markup node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

/// Parse a markup fragment into a node list
pub fn parse_fragment(markup: &str) -> Vec<HtmlNode> {
    let mut parser = Parser {
        chars: markup.chars().collect(),
        pos: 0,
    };
    // Stack of open elements; index 0 is the fragment root
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<HtmlNode>)> =
        vec![(String::new(), Vec::new(), Vec::new())];
    let mut text = String::new();

    while let Some(c) = parser.peek() {
        if c != '<' {
            text.push(c);
            parser.pos += 1;
            continue;
        }

        if parser.starts_with("<!--") {
            flush_text(&mut text, &mut stack);
            parser.skip_comment();
        } else if parser.starts_with("</") {
            flush_text(&mut text, &mut stack);
            let tag = parser.read_closing_tag();
            close_element(&mut stack, &tag);
        } else if parser
            .peek_at(1)
            .is_some_and(|n| n.is_ascii_alphabetic())
        {
            flush_text(&mut text, &mut stack);
            let (tag, attributes, self_closing) = parser.read_opening_tag();
            if self_closing || is_void_element(&tag) {
                if let Some((_, _, children)) = stack.last_mut() {
                    children.push(HtmlNode::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    });
                }
            } else {
                stack.push((tag, attributes, Vec::new()));
            }
        } else {
            text.push(c);
            parser.pos += 1;
        }
    }

    flush_text(&mut text, &mut stack);
    // Implicitly close anything left open
    while stack.len() > 1 {
        if let Some((tag, attributes, children)) = stack.pop() {
            if let Some((_, _, parent)) = stack.last_mut() {
                parent.push(HtmlNode::Element {
                    tag,
                    attributes,
                    children,
                });
            }
        }
    }
    stack.pop().map(|(_, _, children)| children).unwrap_or_default()
}

fn flush_text(text: &mut String, stack: &mut [(String, Vec<(String, String)>, Vec<HtmlNode>)]) {
    if text.is_empty() {
        return;
    }
    let decoded = decode_entities(text);
    text.clear();
    if let Some((_, _, children)) = stack.last_mut() {
        // Adjacent text (e.g. around a comment) stays one node
        match children.last_mut() {
            Some(HtmlNode::Text(previous)) => previous.push_str(&decoded),
            _ => children.push(HtmlNode::Text(decoded)),
        }
    }
}

fn close_element(stack: &mut Vec<(String, Vec<(String, String)>, Vec<HtmlNode>)>, tag: &str) {
    // Stray closing tags are ignored
    let Some(depth) = stack.iter().rposition(|(open, _, _)| open == tag) else {
        return;
    };
    if depth == 0 {
        return;
    }
    while stack.len() > depth {
        if let Some((tag, attributes, children)) = stack.pop() {
            if let Some((_, _, parent)) = stack.last_mut() {
                parent.push(HtmlNode::Element {
                    tag,
                    attributes,
                    children,
                });
            }
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn skip_comment(&mut self) {
        self.pos += 4;
        while self.peek().is_some() && !self.starts_with("-->") {
            self.pos += 1;
        }
        self.pos = (self.pos + 3).min(self.chars.len());
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '>' || c == '/' || c == '=' {
                break;
            }
            name.push(c.to_ascii_lowercase());
            self.pos += 1;
        }
        name
    }

    fn read_closing_tag(&mut self) -> String {
        self.pos += 2;
        let tag = self.read_name();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '>' {
                break;
            }
        }
        tag
    }

    fn read_opening_tag(&mut self) -> (String, Vec<(String, String)>, bool) {
        self.pos += 1;
        let tag = self.read_name();
        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some('/') => {
                    self.pos += 1;
                    if self.peek() == Some('>') {
                        self_closing = true;
                    }
                }
                Some(_) => {
                    let name = self.read_name();
                    if name.is_empty() {
                        // Unparseable byte inside a tag; skip it
                        self.pos += 1;
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.read_attribute_value()
                    } else {
                        String::new()
                    };
                    attributes.push((name, decode_entities(&value)));
                }
            }
        }
        (tag, attributes, self_closing)
    }

    fn read_attribute_value(&mut self) -> String {
        let mut value = String::new();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
            }
            _ => {
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
        value
    }
}

/// Decode character references; unknown ones are kept literally
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest
            .char_indices()
            .take(12)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escape text for serialization inside element content
pub(crate) fn escape_text_content(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}
