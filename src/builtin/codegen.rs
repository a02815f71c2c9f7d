//! Generator for the builtin dialect.
//!
//! Emits a line-oriented assembly. `line N` markers map every following
//! instruction back to template line `N`, which lets the backend report
//! diagnostics against the template rather than the generated text.
//!
//! ```text
//! type stencil_gen.pages.a_002etpl
//! source /pages/a.tpl
//! param title
//! line 1
//! text "Hello "
//! var name
//! line 3
//! include /lib/card.tpf title=lit:"Hi" body=param:name
//! unavailable 30
//! ```

use std::fmt::Write as _;

use super::parse::{ArgValue, Node, Template};
use crate::compiler::{GenerateContext, GenerateMode, Generator, Ir};

/// Marker emitted instead of ops for prototypes.
pub const INTERFACE_DIRECTIVE: &str = "interface";

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinGenerator;

impl Generator for BuiltinGenerator {
    fn generate(&self, ir: &Ir, context: &GenerateContext<'_>) -> Result<String, String> {
        let template = ir
            .downcast_ref::<Template>()
            .ok_or_else(|| "intermediate representation was not produced by the builtin translator".to_string())?;
        Ok(emit(template, context))
    }
}

fn emit(template: &Template, context: &GenerateContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "type {}", context.type_name);
    let _ = writeln!(out, "source {}", context.path);
    if context.mode == GenerateMode::Prototype {
        let _ = writeln!(out, "{INTERFACE_DIRECTIVE}");
    }
    for param in &template.params {
        let _ = writeln!(out, "param {param}");
    }
    if context.mode == GenerateMode::Prototype {
        return out;
    }

    let mut current_line = 0;
    let mut mark = |out: &mut String, line: u32| {
        if line != current_line {
            let _ = writeln!(out, "line {line}");
            current_line = line;
        }
    };

    let mut line = 1;
    for node in &template.nodes {
        match node {
            Node::Text(text) => {
                mark(&mut out, line);
                let _ = writeln!(out, "text {}", quote(text));
                line += text.matches('\n').count() as u32;
            }
            Node::Var { name, line: at } => {
                line = *at;
                mark(&mut out, line);
                let _ = writeln!(out, "var {name}");
            }
            Node::Include { path, args, line: at } => {
                line = *at;
                mark(&mut out, line);
                let _ = write!(out, "include {path}");
                for (key, value) in args {
                    match value {
                        ArgValue::Literal(text) => {
                            let _ = write!(out, " {key}=lit:{}", quote(text));
                        }
                        ArgValue::Param(name) => {
                            let _ = write!(out, " {key}=param:{name}");
                        }
                    }
                }
                out.push('\n');
            }
            Node::Unavailable { secs, line: at } => {
                line = *at;
                mark(&mut out, line);
                let _ = writeln!(out, "unavailable {secs}");
            }
        }
    }
    out
}

/// JSON string literal (escapes newlines, quotes and control characters).
fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
