//! Re-indent compact markup, one token per line.
//!
//! The printer keeps a stack of open tags, so it also rejects unbalanced or
//! unrecognizable input. It understands processing instructions, CDATA
//! sections, comments, opening/self-closing tags, closing tags and text.

use crate::error::{Error, Result};

#[derive(Debug, PartialEq)]
enum Token<'a> {
    /// Emitted verbatim: processing instruction, CDATA section or comment.
    Verbatim(&'a str),
    Open {
        name: &'a str,
        attributes: Vec<(&'a str, char, &'a str)>,
        self_closing: bool,
    },
    Close(&'a str),
    Text(&'a str),
}

/// Pretty printer with a fixed per-level indent string.
#[derive(Debug, Clone)]
pub struct PrettyPrinter {
    indent: String,
}

impl Default for PrettyPrinter {
    fn default() -> Self {
        Self::new("  ")
    }
}

impl PrettyPrinter {
    pub fn new(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
        }
    }

    /// Lines are joined with `\n`, without a trailing newline.
    pub fn pretty_print(&self, input: &str) -> Result<String> {
        let mut rest = input.trim();
        let mut stack: Vec<&str> = Vec::new();
        let mut lines: Vec<String> = Vec::new();

        while !rest.is_empty() {
            let (token, used) = next_token(rest).ok_or_else(|| {
                Error::UnrecognizedMarkup(rest.chars().take(40).collect())
            })?;
            rest = &rest[used..];
            match token {
                Token::Verbatim(raw) => lines.push(self.line(stack.len(), raw)),
                Token::Open {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let mut tag = format!("<{}", name);
                    for (key, quote, value) in attributes {
                        tag.push_str(&format!(" {}={}{}{}", key, quote, value, quote));
                    }
                    tag.push_str(if self_closing { "/>" } else { ">" });
                    lines.push(self.line(stack.len(), &tag));
                    if !self_closing {
                        stack.push(name);
                    }
                }
                Token::Close(name) => match stack.pop() {
                    Some(open) if open == name => {
                        lines.push(self.line(stack.len(), &format!("</{}>", name)));
                    }
                    open => {
                        return Err(Error::MalformedMarkup {
                            expected: open.map(str::to_string),
                            found: Some(name.to_string()),
                        });
                    }
                },
                Token::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        lines.push(self.line(stack.len(), text));
                    }
                }
            }
        }

        if let Some(open) = stack.pop() {
            return Err(Error::MalformedMarkup {
                expected: Some(open.to_string()),
                found: None,
            });
        }
        Ok(lines.join("\n"))
    }

    fn line(&self, depth: usize, content: &str) -> String {
        let mut line = self.indent.repeat(depth);
        line.push_str(content);
        line
    }
}

/// Pretty print with `indent` per nesting level.
pub fn pretty_print(input: &str, indent: &str) -> Result<String> {
    PrettyPrinter::new(indent).pretty_print(input)
}

/// Same character class the type builder accepts for names.
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

/// Length of the name at the start of `s` (zero if none).
fn name_len(s: &str) -> usize {
    s.find(|c: char| !is_name_char(c)).unwrap_or(s.len())
}

fn skip_ws(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Match one token at the start of `s`, in priority order. Returns the
/// token and the number of bytes it spans.
fn next_token(s: &str) -> Option<(Token<'_>, usize)> {
    for (open, close) in [("<?", "?>"), ("<![CDATA[", "]]>"), ("<!--", "-->")] {
        if s.starts_with(open) {
            let end = s[open.len()..].find(close)? + open.len() + close.len();
            return Some((Token::Verbatim(&s[..end]), end));
        }
    }
    if let Some(after) = s.strip_prefix("</") {
        let n = name_len(after);
        if n == 0 {
            return None;
        }
        let mut pos = 2 + n;
        pos += skip_ws(&s[pos..]);
        return s[pos..]
            .starts_with('>')
            .then(|| (Token::Close(&s[2..2 + n]), pos + 1));
    }
    if let Some(after) = s.strip_prefix('<') {
        return open_tag(s, after);
    }
    let end = s.find('<').unwrap_or(s.len());
    Some((Token::Text(&s[..end]), end))
}

fn open_tag<'a>(s: &'a str, after: &'a str) -> Option<(Token<'a>, usize)> {
    let n = name_len(after);
    if n == 0 {
        return None;
    }
    let name = &after[..n];
    let mut pos = 1 + n;
    let mut attributes = Vec::new();
    loop {
        let ws = skip_ws(&s[pos..]);
        pos += ws;
        let rest = &s[pos..];
        if rest.starts_with("/>") {
            let token = Token::Open {
                name,
                attributes,
                self_closing: true,
            };
            return Some((token, pos + 2));
        }
        if rest.starts_with('>') {
            let token = Token::Open {
                name,
                attributes,
                self_closing: false,
            };
            return Some((token, pos + 1));
        }
        // Attributes must be separated from the name and from each other.
        if ws == 0 {
            return None;
        }
        let key_len = name_len(rest);
        if key_len == 0 {
            return None;
        }
        let key = &rest[..key_len];
        pos += key_len;
        pos += skip_ws(&s[pos..]);
        pos += s[pos..].starts_with('=').then_some(1)?;
        pos += skip_ws(&s[pos..]);
        let quote = s[pos..].chars().next().filter(|c| *c == '"' || *c == '\'')?;
        pos += 1;
        let value_len = s[pos..].find(quote)?;
        attributes.push((key, quote, &s[pos..pos + value_len]));
        pos += value_len + 1;
    }
}
