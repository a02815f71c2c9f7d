//! Parser for the builtin template dialect.
//!
//! ```text
//! Hello {{ name }}!                      parameter substitution
//! {{! anything }}                        comment
//! {{#params title body}}                 interface of a fragment
//! {{> card.tpf title="Hi" body=name}}   include (path relative to this file)
//! {{unavailable 30}}                     report unavailability for 30s
//! ```

use crate::compiler::{Ir, Translation, Translator};
use crate::core::resolve_relative;
use crate::error::Diagnostic;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Argument passed to an included fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Var {
        name: String,
        line: u32,
    },
    Include {
        /// Resolved logical path.
        path: String,
        args: Vec<(String, ArgValue)>,
        line: u32,
    },
    Unavailable {
        secs: u64,
        line: u32,
    },
}

/// Parsed template: the builtin translator's IR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub path: String,
    /// Declared interface; empty for pages.
    pub params: Vec<String>,
    pub nodes: Vec<Node>,
}

impl Template {
    /// Logical paths of all included templates, in first-use order.
    pub fn includes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for node in &self.nodes {
            if let Node::Include { path, .. } = node {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
        }
        out
    }
}

/// Parse `source` belonging to logical `path`.
pub fn parse(path: &str, source: &str) -> (Template, Vec<Diagnostic>) {
    Parser::new(path, source).run()
}

struct Parser<'a> {
    path: &'a str,
    source: &'a str,
    template: Template,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(path: &'a str, source: &'a str) -> Self {
        Self {
            path,
            source,
            template: Template {
                path: path.to_string(),
                ..Template::default()
            },
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self) -> (Template, Vec<Diagnostic>) {
        let mut rest = 0;
        while let Some(found) = self.source[rest..].find(OPEN) {
            let open = rest + found;
            self.push_text(&self.source[rest..open]);

            let body_start = open + OPEN.len();
            let Some(len) = self.source[body_start..].find(CLOSE) else {
                self.error_at(open, "unterminated tag");
                return (self.template, self.diagnostics);
            };
            let body = &self.source[body_start..body_start + len];
            self.tag(open, body);
            rest = body_start + len + CLOSE.len();
        }
        self.push_text(&self.source[rest..]);
        (self.template, self.diagnostics)
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(prev)) = self.template.nodes.last_mut() {
            prev.push_str(text);
        } else {
            self.template.nodes.push(Node::Text(text.to_string()));
        }
    }

    fn tag(&mut self, offset: usize, body: &str) {
        let line = self.position(offset).0;
        let body = body.trim();

        if body.starts_with('!') {
            return;
        }
        if let Some(rest) = body.strip_prefix("#params") {
            for name in rest.split_whitespace() {
                if !is_ident(name) {
                    self.error_at(offset, format!("invalid parameter name `{name}`"));
                } else if !self.template.params.iter().any(|p| p == name) {
                    self.template.params.push(name.to_string());
                }
            }
            return;
        }
        if let Some(rest) = body.strip_prefix('>') {
            match self.include(rest) {
                Some((path, args)) => self.template.nodes.push(Node::Include { path, args, line }),
                None => self.error_at(offset, format!("malformed include `{body}`")),
            }
            return;
        }
        let (word, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        if word == "unavailable" {
            match rest.trim().parse::<u64>() {
                Ok(secs) => self.template.nodes.push(Node::Unavailable { secs, line }),
                Err(_) => self.error_at(offset, "`unavailable` expects a number of seconds"),
            }
            return;
        }
        if is_ident(body) {
            self.template.nodes.push(Node::Var {
                name: body.to_string(),
                line,
            });
            return;
        }
        self.error_at(offset, format!("unknown tag `{body}`"));
    }

    /// `path key="lit" key=param ...`
    fn include(&self, body: &str) -> Option<(String, Vec<(String, ArgValue)>)> {
        let tokens = tokenize(body)?;
        let (target, rest) = tokens.split_first()?;
        if target.contains('=') || target.starts_with('"') {
            return None;
        }

        let mut args = Vec::with_capacity(rest.len());
        for token in rest {
            let (key, value) = token.split_once('=')?;
            if !is_ident(key) {
                return None;
            }
            let value = match value.strip_prefix('"') {
                Some(quoted) => ArgValue::Literal(quoted.strip_suffix('"')?.to_string()),
                None if is_ident(value) => ArgValue::Param(value.to_string()),
                None => return None,
            };
            args.push((key.to_string(), value));
        }
        Some((resolve_relative(self.path, target), args))
    }

    /// 1-based line and column of a byte offset.
    fn position(&self, offset: usize) -> (u32, u32) {
        let before = &self.source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        (line as u32, column as u32)
    }

    fn error_at(&mut self, offset: usize, message: impl Into<String>) {
        let (line, column) = self.position(offset);
        self.diagnostics
            .push(Diagnostic::new(self.path, message).at(line, column));
    }
}

/// Split on whitespace, keeping `"quoted strings"` (which may contain spaces)
/// inside one token. `None` on an unbalanced quote.
fn tokenize(input: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in input.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return None;
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Translator
// ============================================================================

/// Translator for the builtin dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTranslator;

impl Translator for BuiltinTranslator {
    fn translate(&self, path: &str, source: &str, restricted: bool) -> Translation {
        let (template, diagnostics) = parse(path, source);
        let dependencies = if restricted {
            Vec::new()
        } else {
            template.includes()
        };
        Translation {
            ir: Ir::new(template),
            dependencies,
            diagnostics,
        }
    }
}
