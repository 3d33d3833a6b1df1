//! Edit scripts: a line-oriented command language driving a [`Document`].
//!
//! ```text
//! # comments and blank lines are ignored
//! add list as L
//! add list-item into L as I1
//! add text into I1 at 0 as T1 with {"text": "hi"}
//! begin
//!   move T1 into root
//!   set T1 text "moved"
//! commit
//! patch-path T1 style.padding.0 4
//! select T1
//! undo
//! ```
//!
//! Targets are `root`, a label bound by `add ... as <label>`, or a literal
//! node id. Values are JSON literals.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    parse_dotted_path, Document, DomainError, FieldValue, Fields, NodeId, PathKey, TypeTag,
};

/// Node reference inside a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Root,
    Label(String),
    Id(NodeId),
}

impl Target {
    fn parse(word: &str) -> Self {
        if word == "root" {
            return Target::Root;
        }
        match word.parse::<NodeId>() {
            Ok(id) => Target::Id(id),
            Err(_) => Target::Label(word.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        type_tag: TypeTag,
        into: Target,
        at: Option<usize>,
        label: Option<String>,
        fields: Option<Fields>,
    },
    Remove(Target),
    Move {
        target: Target,
        into: Target,
        at: Option<usize>,
    },
    Set {
        target: Target,
        field: String,
        value: FieldValue,
    },
    Patch {
        target: Target,
        field: String,
        value: FieldValue,
    },
    PatchPath {
        target: Target,
        path: Vec<PathKey>,
        value: FieldValue,
    },
    Select(Option<Target>),
    Undo,
    Redo,
    /// Statements between `begin` and `commit`
    Transaction(Vec<Statement>),
}

/// A command with the (1-based) line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub command: Command,
}

/// A parsed edit script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditScript {
    pub statements: Vec<Statement>,
}

struct Grammar {
    add: Regex,
    moving: Regex,
    field: Regex,
    single: Regex,
}

impl Grammar {
    fn new() -> ApplicationResult<Self> {
        Ok(Self {
            add: compile(
                r"^add\s+(?P<type>\S+)(?:\s+into\s+(?P<into>\S+))?(?:\s+at\s+(?P<at>\d+))?(?:\s+as\s+(?P<label>\S+))?(?:\s+with\s+(?P<fields>.+))?$",
            )?,
            moving: compile(
                r"^move\s+(?P<target>\S+)\s+into\s+(?P<into>\S+)(?:\s+at\s+(?P<at>\d+))?$",
            )?,
            field: compile(
                r"^(?P<verb>set|patch-path|patch)\s+(?P<target>\S+)\s+(?P<key>\S+)\s+(?P<value>.+)$",
            )?,
            single: compile(r"^(?P<verb>remove|select)\s+(?P<target>\S+)$")?,
        })
    }
}

fn compile(pattern: &str) -> ApplicationResult<Regex> {
    Regex::new(pattern).map_err(|e| ApplicationError::OperationFailed {
        context: format!("invalid script grammar: {}", pattern),
        source: Box::new(e),
    })
}

fn parse_json(line: usize, src: &str) -> ApplicationResult<FieldValue> {
    serde_json::from_str::<serde_json::Value>(src)
        .map(FieldValue::from)
        .map_err(|e| ApplicationError::script(line, format!("invalid JSON '{}': {}", src, e)))
}

fn parse_index(line: usize, src: Option<&str>) -> ApplicationResult<Option<usize>> {
    src.map(|s| {
        s.parse::<usize>()
            .map_err(|e| ApplicationError::script(line, format!("invalid index '{}': {}", s, e)))
    })
    .transpose()
}

impl EditScript {
    /// Parse script source; errors carry the offending line number.
    pub fn parse(source: &str) -> ApplicationResult<Self> {
        let grammar = Grammar::new()?;
        // innermost open block last; the bottom entry is the script itself
        let mut blocks: Vec<(usize, Vec<Statement>)> = vec![(0, Vec::new())];

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            match text {
                "begin" => {
                    blocks.push((line, Vec::new()));
                    continue;
                }
                "commit" => {
                    if blocks.len() == 1 {
                        return Err(ApplicationError::script(line, "commit without begin"));
                    }
                    if let Some((start, body)) = blocks.pop() {
                        Self::current(&mut blocks).push(Statement {
                            line: start,
                            command: Command::Transaction(body),
                        });
                    }
                    continue;
                }
                _ => {}
            }

            let command = Self::parse_command(&grammar, line, text)?;
            Self::current(&mut blocks).push(Statement { line, command });
        }

        if blocks.len() > 1 {
            let (start, _) = &blocks[blocks.len() - 1];
            return Err(ApplicationError::script(*start, "begin without commit"));
        }
        let statements = blocks.pop().map(|(_, body)| body).unwrap_or_default();
        Ok(Self { statements })
    }

    fn current(blocks: &mut [(usize, Vec<Statement>)]) -> &mut Vec<Statement> {
        let last = blocks.len() - 1;
        &mut blocks[last].1
    }

    fn parse_command(grammar: &Grammar, line: usize, text: &str) -> ApplicationResult<Command> {
        match text {
            "undo" => return Ok(Command::Undo),
            "redo" => return Ok(Command::Redo),
            _ => {}
        }

        if let Some(caps) = grammar.add.captures(text) {
            let fields = match caps.name("fields") {
                Some(m) => match parse_json(line, m.as_str())? {
                    FieldValue::Map(map) => Some(map),
                    _ => return Err(ApplicationError::script(line, "fields must be a JSON object")),
                },
                None => None,
            };
            return Ok(Command::Add {
                type_tag: TypeTag::from(&caps["type"]),
                into: caps
                    .name("into")
                    .map(|m| Target::parse(m.as_str()))
                    .unwrap_or(Target::Root),
                at: parse_index(line, caps.name("at").map(|m| m.as_str()))?,
                label: caps.name("label").map(|m| m.as_str().to_string()),
                fields,
            });
        }

        if let Some(caps) = grammar.moving.captures(text) {
            return Ok(Command::Move {
                target: Target::parse(&caps["target"]),
                into: Target::parse(&caps["into"]),
                at: parse_index(line, caps.name("at").map(|m| m.as_str()))?,
            });
        }

        if let Some(caps) = grammar.field.captures(text) {
            let target = Target::parse(&caps["target"]);
            let key = caps["key"].to_string();
            let value = parse_json(line, &caps["value"])?;
            return Ok(match &caps["verb"] {
                "set" => Command::Set {
                    target,
                    field: key,
                    value,
                },
                "patch" => Command::Patch {
                    target,
                    field: key,
                    value,
                },
                _ => Command::PatchPath {
                    target,
                    path: parse_dotted_path(&key),
                    value,
                },
            });
        }

        if let Some(caps) = grammar.single.captures(text) {
            let word = &caps["target"];
            return Ok(match &caps["verb"] {
                "remove" => Command::Remove(Target::parse(word)),
                _ if word == "none" => Command::Select(None),
                _ => Command::Select(Some(Target::parse(word))),
            });
        }

        Err(ApplicationError::script(
            line,
            format!("cannot parse '{}'", text),
        ))
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Executes edit scripts while tracking label bindings.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    labels: BTreeMap<String, NodeId>,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &BTreeMap<String, NodeId> {
        &self.labels
    }

    pub fn into_labels(self) -> BTreeMap<String, NodeId> {
        self.labels
    }

    /// Run every statement; stops at the first failure.
    ///
    /// A failing `begin`/`commit` block is rolled back as a whole, including
    /// the labels it bound.
    #[instrument(level = "debug", skip_all, fields(statements = script.len()))]
    pub fn run(&mut self, doc: &mut Document, script: &EditScript) -> ApplicationResult<()> {
        for statement in &script.statements {
            self.execute(doc, statement)?;
        }
        Ok(())
    }

    fn resolve(&self, doc: &Document, line: usize, target: &Target) -> ApplicationResult<NodeId> {
        match target {
            Target::Root => Ok(doc.root_id()),
            Target::Id(id) => Ok(*id),
            Target::Label(label) => {
                self.labels
                    .get(label)
                    .copied()
                    .ok_or_else(|| ApplicationError::UnknownLabel {
                        line,
                        label: label.clone(),
                    })
            }
        }
    }

    fn execute(&mut self, doc: &mut Document, statement: &Statement) -> ApplicationResult<()> {
        let line = statement.line;
        let edit = |source: DomainError| ApplicationError::Edit { line, source };
        debug!("line {}: {:?}", line, statement.command);

        match &statement.command {
            Command::Add {
                type_tag,
                into,
                at,
                label,
                fields,
            } => {
                if let Some(label) = label {
                    if self.labels.contains_key(label) {
                        return Err(ApplicationError::script(
                            line,
                            format!("label '{}' already bound", label),
                        ));
                    }
                }
                let parent = self.resolve(doc, line, into)?;
                let id = doc
                    .add(type_tag.clone(), fields.clone())
                    .and_then(|pending| pending.into(parent, *at))
                    .map_err(edit)?;
                if let Some(label) = label {
                    self.labels.insert(label.clone(), id);
                }
            }
            Command::Remove(target) => {
                let id = self.resolve(doc, line, target)?;
                doc.remove(id).map_err(edit)?;
            }
            Command::Move { target, into, at } => {
                let id = self.resolve(doc, line, target)?;
                let parent = self.resolve(doc, line, into)?;
                doc.move_node(id)
                    .and_then(|pending| pending.into(parent, *at))
                    .map_err(edit)?;
            }
            Command::Set {
                target,
                field,
                value,
            } => {
                let id = self.resolve(doc, line, target)?;
                doc.update_field(id, field, value.clone()).map_err(edit)?;
            }
            Command::Patch {
                target,
                field,
                value,
            } => {
                let id = self.resolve(doc, line, target)?;
                doc.patch_field(id, field, value.clone()).map_err(edit)?;
            }
            Command::PatchPath {
                target,
                path,
                value,
            } => {
                let id = self.resolve(doc, line, target)?;
                doc.patch_path(id, path, value.clone()).map_err(edit)?;
            }
            Command::Select(target) => {
                let id = match target {
                    Some(target) => Some(self.resolve(doc, line, target)?),
                    None => None,
                };
                doc.select(id).map_err(edit)?;
            }
            Command::Undo => {
                doc.undo();
            }
            Command::Redo => {
                doc.redo();
            }
            Command::Transaction(body) => {
                let saved = self.labels.clone();
                let result = doc.run_transaction(|doc| {
                    for statement in body {
                        self.execute(doc, statement)?;
                    }
                    Ok::<_, ApplicationError>(())
                });
                if result.is_err() {
                    self.labels = saved;
                }
                result?;
            }
        }
        Ok(())
    }
}
