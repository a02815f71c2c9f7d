//! Bytecode format of the builtin dialect and its runtime.
//!
//! A [`Program`] is stored as JSON. Loading turns it into a [`ProgramType`];
//! instances render by walking the ops, linking included fragments lazily
//! through the loader that defined them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, LoadError};
use crate::loader::{Handler, HandlerConfig, HandlerType, Loader, Request, Response, TypeDefiner};

/// Argument value of an include.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Literal(String),
    Param(String),
}

/// One rendering step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Text {
        text: String,
    },
    Var {
        name: String,
    },
    Include {
        path: String,
        type_name: String,
        args: Vec<(String, Arg)>,
        line: u32,
    },
    Unavailable {
        secs: u64,
    },
}

/// Assembled template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub source: String,
    /// Prototype bytecode: carries the interface but no ops.
    pub interface_only: bool,
    pub params: Vec<String>,
    pub ops: Vec<Op>,
}

impl Program {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ============================================================================
// Type & instances
// ============================================================================

/// Loaded program.
pub struct ProgramType {
    program: Arc<Program>,
    loader: Weak<Loader>,
}

impl ProgramType {
    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl HandlerType for ProgramType {
    fn name(&self) -> &str {
        &self.program.name
    }

    fn instantiate(&self) -> Result<Box<dyn Handler>, LoadError> {
        Ok(Box::new(ProgramHandler {
            program: self.program.clone(),
            loader: self.loader.clone(),
            max_depth: usize::MAX,
            includes: DashMap::new(),
        }))
    }
}

/// Instance of a program.
pub struct ProgramHandler {
    program: Arc<Program>,
    loader: Weak<Loader>,
    max_depth: usize,
    /// Linked fragment instances by type name.
    includes: DashMap<String, Arc<dyn Handler>>,
}

impl ProgramHandler {
    fn link(&self, path: &str, type_name: &str) -> Result<Arc<dyn Handler>, HandlerError> {
        if let Some(handler) = self.includes.get(type_name) {
            return Ok(handler.clone());
        }

        let loader = self
            .loader
            .upgrade()
            .ok_or_else(|| HandlerError::Failed("code space was discarded".into()))?;
        let failed = |e: LoadError| HandlerError::Failed(format!("cannot link `{path}`: {e}"));
        let ty = loader.load_type(type_name).map_err(failed)?;
        let mut handler = ty.instantiate().map_err(failed)?;
        handler.init(&HandlerConfig {
            path: path.to_string(),
            max_include_depth: self.max_depth,
        })?;

        let handler: Arc<dyn Handler> = Arc::from(handler);
        Ok(self
            .includes
            .entry(type_name.to_string())
            .or_insert(handler)
            .clone())
    }
}

impl Handler for ProgramHandler {
    fn init(&mut self, config: &HandlerConfig) -> Result<(), HandlerError> {
        self.max_depth = config.max_include_depth;
        Ok(())
    }

    fn service(&self, request: &Request) -> Result<Response, HandlerError> {
        if request.depth > self.max_depth {
            return Err(HandlerError::Failed(format!(
                "include depth of {} exceeded at `{}`",
                self.max_depth, self.program.source
            )));
        }

        let param = |name: &str| request.params.get(name).map_or("", String::as_str);
        let mut body = String::new();
        for op in &self.program.ops {
            match op {
                Op::Text { text } => body.push_str(text),
                Op::Var { name } => body.push_str(param(name)),
                Op::Include {
                    path,
                    type_name,
                    args,
                    ..
                } => {
                    let params = args
                        .iter()
                        .map(|(key, arg)| {
                            let value = match arg {
                                Arg::Literal(text) => text.clone(),
                                Arg::Param(name) => param(name).to_string(),
                            };
                            (key.clone(), value)
                        })
                        .collect();
                    let handler = self.link(path, type_name)?;
                    let nested = request.nested(path.clone(), params);
                    body.push_str(&handler.service(&nested)?.body);
                }
                Op::Unavailable { secs } => {
                    return Err(HandlerError::Unavailable {
                        retry_after: (*secs > 0).then(|| Duration::from_secs(*secs)),
                    });
                }
            }
        }
        Ok(Response::new(body))
    }

    fn destroy(&self) {
        for entry in self.includes.iter() {
            entry.value().destroy();
        }
        self.includes.clear();
    }
}

// ============================================================================
// Definer
// ============================================================================

/// Defines [`ProgramType`]s from stored bytecode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDefiner;

impl TypeDefiner for BuiltinDefiner {
    fn define(
        &self,
        name: &str,
        bytes: &[u8],
        loader: &Arc<Loader>,
    ) -> Result<Arc<dyn HandlerType>, LoadError> {
        let corrupt = |message: String| LoadError::Corrupt {
            name: name.to_string(),
            message,
        };
        let program = Program::decode(bytes).map_err(|e| corrupt(e.to_string()))?;
        if program.interface_only {
            return Err(corrupt("interface-only artifact cannot be loaded".into()));
        }
        if program.name != name {
            return Err(corrupt(format!("artifact declares type `{}`", program.name)));
        }
        Ok(Arc::new(ProgramType {
            program: Arc::new(program),
            loader: Arc::downgrade(loader),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PlatformTypes;
    use crate::store::{Artifact, ArtifactStore, MemoryStore};
    use std::time::SystemTime;

    fn put(store: &MemoryStore, program: &Program) {
        store
            .put(Artifact {
                name: program.name.clone(),
                source_path: program.source.clone(),
                bytecode: program.encode().unwrap(),
                source_stamp: SystemTime::UNIX_EPOCH,
                dependencies: vec![],
                generated: None,
            })
            .unwrap();
    }

    fn page(ops: Vec<Op>) -> Program {
        Program {
            name: "gen.page".into(),
            source: "/page.tpl".into(),
            interface_only: false,
            params: vec![],
            ops,
        }
    }

    fn card() -> Program {
        Program {
            name: "gen.card".into(),
            source: "/card.tpf".into(),
            interface_only: false,
            params: vec!["title".into()],
            ops: vec![
                Op::Text { text: "[".into() },
                Op::Var {
                    name: "title".into(),
                },
                Op::Text { text: "]".into() },
            ],
        }
    }

    fn loader(store: Arc<MemoryStore>) -> Arc<Loader> {
        Loader::new(
            "gen",
            Arc::new(PlatformTypes::new()),
            store,
            Arc::new(BuiltinDefiner),
        )
    }

    fn render(loader: &Arc<Loader>, request: Request) -> Result<Response, HandlerError> {
        let ty = loader.load_type("gen.page").unwrap();
        let mut handler = ty.instantiate().unwrap();
        handler
            .init(&HandlerConfig {
                path: "/page.tpl".into(),
                max_include_depth: 4,
            })
            .unwrap();
        handler.service(&request)
    }

    #[test]
    fn test_render_with_include() {
        let store = Arc::new(MemoryStore::new());
        put(&store, &card());
        put(
            &store,
            &page(vec![
                Op::Text {
                    text: "Hi ".into(),
                },
                Op::Var { name: "who".into() },
                Op::Include {
                    path: "/card.tpf".into(),
                    type_name: "gen.card".into(),
                    args: vec![("title".into(), Arg::Param("who".into()))],
                    line: 1,
                },
                Op::Include {
                    path: "/card.tpf".into(),
                    type_name: "gen.card".into(),
                    args: vec![("title".into(), Arg::Literal("lit".into()))],
                    line: 2,
                },
            ]),
        );

        let out = render(&loader(store), Request::new("/page.tpl").with_param("who", "Ann")).unwrap();
        assert_eq!(out.body, "Hi Ann[Ann][lit]");
    }

    #[test]
    fn test_unavailable_op() {
        let store = Arc::new(MemoryStore::new());
        put(&store, &page(vec![Op::Unavailable { secs: 7 }]));
        match render(&loader(store.clone()), Request::new("/page.tpl")) {
            Err(HandlerError::Unavailable { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)))
            }
            other => panic!("unexpected: {other:?}"),
        }

        put(&store, &page(vec![Op::Unavailable { secs: 0 }]));
        assert!(matches!(
            render(&loader(store), Request::new("/page.tpl")),
            Err(HandlerError::Unavailable { retry_after: None })
        ));
    }

    #[test]
    fn test_self_include_hits_depth_bound() {
        let store = Arc::new(MemoryStore::new());
        put(
            &store,
            &page(vec![Op::Include {
                path: "/page.tpl".into(),
                type_name: "gen.page".into(),
                args: vec![],
                line: 1,
            }]),
        );
        let err = render(&loader(store), Request::new("/page.tpl")).unwrap_err();
        assert!(err.to_string().contains("include depth"));
    }

    #[test]
    fn test_missing_include_fails_at_render() {
        let store = Arc::new(MemoryStore::new());
        put(
            &store,
            &page(vec![Op::Include {
                path: "/gone.tpf".into(),
                type_name: "gen.gone".into(),
                args: vec![],
                line: 1,
            }]),
        );
        let err = render(&loader(store), Request::new("/page.tpl")).unwrap_err();
        assert!(matches!(err, HandlerError::Failed(m) if m.contains("/gone.tpf")));
    }

    #[test]
    fn test_definer_rejects_prototypes_and_garbage() {
        let l = loader(Arc::new(MemoryStore::new()));
        let mut proto = card();
        proto.interface_only = true;
        proto.ops.clear();

        let bytes = proto.encode().unwrap();
        assert!(matches!(
            BuiltinDefiner.define("gen.card", &bytes, &l),
            Err(LoadError::Corrupt { .. })
        ));
        assert!(matches!(
            BuiltinDefiner.define("gen.card", b"not json", &l),
            Err(LoadError::Corrupt { .. })
        ));
        let bytes = card().encode().unwrap();
        assert!(matches!(
            BuiltinDefiner.define("gen.other", &bytes, &l),
            Err(LoadError::Corrupt { .. })
        ));
    }
}
