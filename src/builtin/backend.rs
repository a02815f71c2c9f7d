//! Assembler for the builtin dialect.
//!
//! Turns generated assembly into [`Program`] bytecode. Every included
//! template must already have bytecode on the classpath (a real artifact or
//! a prototype of this session); its declared interface is checked against
//! the arguments passed.

use super::codegen::INTERFACE_DIRECTIVE;
use super::program::{Arg, Op, Program};
use crate::compiler::{Classpath, CompileBackend, GeneratedSource};
use crate::error::Diagnostic;

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinBackend;

impl CompileBackend for BuiltinBackend {
    fn compile(
        &self,
        source: GeneratedSource,
        classpath: Classpath,
    ) -> Result<Vec<u8>, Vec<Diagnostic>> {
        let program = Assembler::new(&source, &classpath).run()?;
        program
            .encode()
            .map_err(|e| vec![Diagnostic::new(source.path.clone(), e.to_string())])
    }
}

struct Assembler<'a> {
    source: &'a GeneratedSource,
    classpath: &'a Classpath,
    line: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Assembler<'a> {
    fn new(source: &'a GeneratedSource, classpath: &'a Classpath) -> Self {
        Self {
            source,
            classpath,
            line: 0,
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Program, Vec<Diagnostic>> {
        let mut program = Program {
            name: self.source.type_name.clone(),
            source: self.source.path.clone(),
            interface_only: false,
            params: Vec::new(),
            ops: Vec::new(),
        };

        for raw in self.source.text.lines() {
            let (directive, rest) = raw.split_once(' ').unwrap_or((raw, ""));
            match directive {
                "type" => {
                    if rest != self.source.type_name {
                        self.error(format!("type `{rest}` does not match `{}`", self.source.type_name));
                    }
                }
                "source" => {}
                d if d == INTERFACE_DIRECTIVE => program.interface_only = true,
                "param" => program.params.push(rest.to_string()),
                "line" => match rest.parse() {
                    Ok(line) => self.line = line,
                    Err(_) => self.error(format!("bad line marker `{rest}`")),
                },
                "text" => match serde_json::from_str::<String>(rest) {
                    Ok(text) => program.ops.push(Op::Text { text }),
                    Err(e) => self.error(format!("bad text literal: {e}")),
                },
                "var" => {
                    if !program.params.is_empty() && !program.params.iter().any(|p| p == rest) {
                        self.error(format!("`{rest}` is not a declared parameter"));
                    }
                    program.ops.push(Op::Var {
                        name: rest.to_string(),
                    });
                }
                "include" => {
                    if let Some(op) = self.include(rest) {
                        program.ops.push(op);
                    }
                }
                "unavailable" => match rest.parse() {
                    Ok(secs) => program.ops.push(Op::Unavailable { secs }),
                    Err(_) => self.error(format!("bad duration `{rest}`")),
                },
                "" => {}
                other => self.error(format!("unknown instruction `{other}`")),
            }
        }

        if program.interface_only {
            program.ops.clear();
        }
        if self.diagnostics.is_empty() {
            Ok(program)
        } else {
            Err(self.diagnostics)
        }
    }

    fn include(&mut self, rest: &str) -> Option<Op> {
        let (path, mut args_text) = rest.split_once(' ').unwrap_or((rest, ""));
        let mut args = Vec::new();
        while !args_text.trim_start().is_empty() {
            args_text = args_text.trim_start();
            let Some((arg, remaining)) = parse_arg(args_text) else {
                self.error(format!("bad include argument `{args_text}`"));
                return None;
            };
            args.push(arg);
            args_text = remaining;
        }

        let type_name = self.classpath.type_name_for(path);
        let Some(bytes) = self.classpath.lookup(&type_name) else {
            self.error(format!("unresolved fragment `{path}`"));
            return None;
        };
        let interface = match Program::decode(&bytes) {
            Ok(program) => program,
            Err(e) => {
                self.error(format!("unreadable interface of `{path}`: {e}"));
                return None;
            }
        };
        for (key, _) in &args {
            if !interface.params.contains(key) {
                self.error(format!("`{path}` has no parameter `{key}`"));
            }
        }

        Some(Op::Include {
            path: path.to_string(),
            type_name,
            args,
            line: self.line,
        })
    }

    fn error(&mut self, message: String) {
        let diagnostic = Diagnostic::new(self.source.path.clone(), message);
        self.diagnostics.push(if self.line > 0 {
            diagnostic.at_line(self.line)
        } else {
            diagnostic
        });
    }
}

/// `key=lit:"json"` or `key=param:name`, returning the unparsed remainder.
fn parse_arg(text: &str) -> Option<((String, Arg), &str)> {
    let (key, value) = text.split_once('=')?;
    if let Some(literal) = value.strip_prefix("lit:") {
        let mut stream = serde_json::Deserializer::from_str(literal).into_iter::<String>();
        let parsed = stream.next()?.ok()?;
        let consumed = stream.byte_offset();
        return Some(((key.to_string(), Arg::Literal(parsed)), &literal[consumed..]));
    }
    let name = value.strip_prefix("param:")?;
    let end = name.find(' ').unwrap_or(name.len());
    Some(((key.to_string(), Arg::Param(name[..end].to_string())), &name[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Artifact, ArtifactStore, MemoryStore};
    use rustc_hash::FxHashMap;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn source(text: &str) -> GeneratedSource {
        GeneratedSource {
            path: "/a.tpl".into(),
            type_name: "gen.a_002etpl".into(),
            text: format!("type gen.a_002etpl\nsource /a.tpl\n{text}"),
        }
    }

    fn card_interface() -> Arc<[u8]> {
        let program = Program {
            name: "gen.card_002etpf".into(),
            source: "/card.tpf".into(),
            interface_only: true,
            params: vec!["title".into()],
            ops: vec![],
        };
        Arc::from(program.encode().unwrap())
    }

    fn classpath_with_card() -> Classpath {
        let mut overlay = FxHashMap::default();
        overlay.insert("gen.card_002etpf".to_string(), card_interface());
        Classpath::new("gen", Arc::new(MemoryStore::new())).with_overlay(overlay)
    }

    #[test]
    fn test_assemble_ops() {
        let bytes = BuiltinBackend
            .compile(
                source("line 1\ntext \"a b\\n\"\nline 2\nvar x\ninclude /card.tpf title=lit:\"q \\\" r\" \nunavailable 3\n"),
                classpath_with_card(),
            )
            .unwrap();
        let program = Program::decode(&bytes).unwrap();
        assert_eq!(
            program.ops,
            vec![
                Op::Text { text: "a b\n".into() },
                Op::Var { name: "x".into() },
                Op::Include {
                    path: "/card.tpf".into(),
                    type_name: "gen.card_002etpf".into(),
                    args: vec![("title".into(), Arg::Literal("q \" r".into()))],
                    line: 2,
                },
                Op::Unavailable { secs: 3 },
            ]
        );
    }

    #[test]
    fn test_include_resolves_from_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(Artifact {
                name: "gen.card_002etpf".into(),
                source_path: "/card.tpf".into(),
                bytecode: card_interface().to_vec(),
                source_stamp: SystemTime::UNIX_EPOCH,
                dependencies: vec![],
                generated: None,
            })
            .unwrap();
        let result = BuiltinBackend.compile(
            source("line 1\ninclude /card.tpf title=param:t\n"),
            Classpath::new("gen", store),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_unresolved_fragment_reports_template_line() {
        let diagnostics = BuiltinBackend
            .compile(
                source("line 4\ninclude /missing.tpf\n"),
                classpath_with_card(),
            )
            .unwrap_err();
        assert_eq!(diagnostics[0].line, Some(4));
        assert_eq!(diagnostics[0].file, "/a.tpl");
        assert!(diagnostics[0].message.contains("unresolved fragment"));
    }

    #[test]
    fn test_unknown_parameter() {
        let diagnostics = BuiltinBackend
            .compile(
                source("line 2\ninclude /card.tpf body=param:t\n"),
                classpath_with_card(),
            )
            .unwrap_err();
        assert_eq!(diagnostics[0].line, Some(2));
        assert!(diagnostics[0].message.contains("no parameter `body`"));
    }

    #[test]
    fn test_undeclared_variable_in_fragment() {
        let diagnostics = BuiltinBackend
            .compile(source("param t\nline 7\nvar u\n"), classpath_with_card())
            .unwrap_err();
        assert_eq!(diagnostics[0].line, Some(7));
    }

    #[test]
    fn test_prototype_drops_ops() {
        let bytes = BuiltinBackend
            .compile(source("interface\nparam t\n"), classpath_with_card())
            .unwrap();
        let program = Program::decode(&bytes).unwrap();
        assert!(program.interface_only);
        assert_eq!(program.params, vec!["t"]);
        assert!(program.ops.is_empty());
    }
}
