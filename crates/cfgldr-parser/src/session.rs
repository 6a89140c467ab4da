//! Parse sessions: grammar items applied to a section tree, one file at a time.
//!
//! A session parses a top-level document and every document it includes.
//! Each document gets its own [`Context`] holding its section tree and the
//! path of the section currently open. While an `@include`/`@inherit` is being
//! followed, the includer is parked on the session's stack as a [`Frame`],
//! which is what include cycles are checked against and what error
//! back-traces are built from.

use std::fs;
use std::iter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cfgldr_section::{Section, SectionError, Template, Value, evaluate_all, evaluate_immediate};
use cfgldr_source_map::{Origin, SectionPath, SourcePos};
use tracing::{debug, trace};

use crate::error::{ParseError, Result};
use crate::grammar::{AssignOp, Grammar, ItemKind, KeyPrefix};
use crate::options::ParseOptions;

/// Parses one top-level document at a time.
///
/// Sessions own all state of a parse, so independent sessions can run on
/// different threads. A session may be reused for several documents.
#[derive(Debug, Default)]
pub struct ParserSession {
    options: ParseOptions,
    stack: Vec<Frame>,
}

/// An includer waiting for the document it includes.
#[derive(Debug)]
struct Frame {
    path: PathBuf,
    position: SourcePos,
}

/// The document being parsed.
struct Context {
    path: PathBuf,
    source: Arc<str>,
    root: Section,
    /// Open sections, outermost first
    sections: Vec<String>,
    /// Offset of the item being applied
    pos: usize,
}

impl Context {
    fn new(path: PathBuf, source: Arc<str>) -> Self {
        Context {
            path,
            source,
            root: Section::root(),
            sections: Vec::new(),
            pos: 0,
        }
    }

    fn position(&self) -> SourcePos {
        SourcePos::in_source(&self.path, &self.source, self.pos)
    }

    fn current_section(&mut self) -> Option<&mut Section> {
        self.root.section_at_mut(&self.sections)
    }
}

impl ParserSession {
    pub fn new(options: ParseOptions) -> Self {
        ParserSession {
            options,
            stack: Vec::new(),
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse the document at `path`, following its includes, then evaluate
    /// references and drop temporary keys.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Section> {
        let path = path.as_ref();
        self.stack.clear();
        let (path, text) = read_document(path)
            .map_err(|e| ParseError::file_access(path, &e, Origin::file(path)))?;
        let root = self.parse_document(path, text)?;
        finish(root)
    }

    /// Like [`ParserSession::parse_file`], for text that is not read from
    /// disk. `path` names the document in diagnostics and anchors relative
    /// includes; it does not have to exist.
    pub fn parse_str(&mut self, text: &str, path: impl AsRef<Path>) -> Result<Section> {
        self.stack.clear();
        let root = self.parse_document(path.as_ref().to_path_buf(), text.to_string())?;
        finish(root)
    }

    fn parse_document(&mut self, path: PathBuf, text: String) -> Result<Section> {
        debug!(file = %path.display(), depth = self.stack.len(), "parsing");
        let source: Arc<str> = normalize_newlines(text).into();
        let mut ctx = Context::new(path, Arc::clone(&source));
        let mut grammar = Grammar::new(&source, self.options.mode);

        while let Some(item) = grammar.next_item().map_err(|e| {
            ctx.pos = e.offset;
            ParseError::syntax(e.message, self.origin(&ctx))
        })? {
            ctx.pos = item.offset;
            match item.kind {
                ItemKind::Section {
                    opening,
                    closing,
                    name,
                } => self.section(&mut ctx, opening, closing, name)?,
                ItemKind::Command { name, argument } => self.command(&mut ctx, name, argument)?,
                ItemKind::Assign {
                    prefix,
                    key,
                    op,
                    value,
                } => self.assign(&mut ctx, prefix, key, op, &value)?,
            }
        }

        debug!(file = %ctx.path.display(), keys = ctx.root.len(), "parsed");
        Ok(ctx.root)
    }

    /// The back-trace of the item being applied in `ctx`.
    fn origin(&self, ctx: &Context) -> Origin {
        let trail = self
            .stack
            .iter()
            .map(|frame| frame.position.clone())
            .chain(iter::once(ctx.position()))
            .collect();
        Origin::new(trail, SectionPath::from(ctx.sections.clone()))
    }

    fn section(&mut self, ctx: &mut Context, opening: usize, closing: usize, name: &str) -> Result<()> {
        if opening != closing {
            return Err(ParseError::syntax("Incorrect section depth", self.origin(ctx)));
        }
        let depth = opening;
        if depth > ctx.sections.len() + 1 {
            return Err(ParseError::syntax("Section too nested", self.origin(ctx)));
        }
        ctx.sections.truncate(depth - 1);

        let origin = self.origin(ctx);
        let parent = ctx
            .current_section()
            .ok_or_else(|| section_lost(&origin))?;

        if parent.is_section(name) {
            if let Some(attrs) = parent.attrs_mut(name) {
                if attrs.finalized {
                    return Err(ParseError::WriteProtection {
                        error: SectionError::SectionNotWritable {
                            key: name.to_string(),
                        },
                        origin,
                    });
                }
                attrs.writable = false;
                attrs.provenance.push(origin);
            }
            debug!(section = %name, depth, "re-entering section");
        } else {
            parent
                .set_at(name, Section::named(name), origin.clone())
                .map_err(|error| ParseError::WriteProtection { error, origin })?;
            debug!(section = %name, depth, "entering section");
        }

        ctx.sections.push(name.to_string());
        Ok(())
    }

    fn command(&mut self, ctx: &mut Context, name: &str, argument: &str) -> Result<()> {
        let origin = self.origin(ctx);
        let writable = match name {
            "include" => false,
            "inherit" => true,
            _ => {
                return Err(ParseError::syntax(
                    format!("Unknown command : {name}"),
                    origin,
                ));
            }
        };

        let target = ctx
            .path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(argument);
        let (target, text) = read_document(&target)
            .map_err(|e| ParseError::file_access(&target, &e, origin.clone()))?;
        if target == ctx.path || self.stack.iter().any(|frame| frame.path == target) {
            return Err(ParseError::CyclicInclude {
                path: target,
                origin,
            });
        }

        debug!(command = %name, file = %target.display(), "following");
        self.stack.push(Frame {
            path: ctx.path.clone(),
            position: ctx.position(),
        });
        let included = self.parse_document(target, text);
        self.stack.pop();
        let mut included = included?;

        if writable {
            included.set_writable(None, true);
        } else {
            included.set_readonly(None, true);
        }
        ctx.current_section()
            .ok_or_else(|| section_lost(&origin))?
            .merge(&included)
            .map_err(|error| ParseError::WriteProtection { error, origin })
    }

    fn assign(
        &mut self,
        ctx: &mut Context,
        prefix: Option<KeyPrefix>,
        key: &str,
        op: AssignOp,
        raw: &str,
    ) -> Result<()> {
        let origin = self.origin(ctx);
        let value =
            Template::parse(raw).map_err(|e| ParseError::syntax(e.to_string(), origin.clone()))?;

        let value = match (op, value) {
            (AssignOp::Immediate, Value::Template(template)) => {
                let mut path = ctx.sections.clone();
                path.push(key.to_string());
                evaluate_immediate(&ctx.root, &path, &template).map_err(|mut e| {
                    if e.provenance.is_empty() {
                        e.provenance.push(origin.clone());
                    }
                    ParseError::Reference(e)
                })?
            }
            (_, value) => value,
        };

        let section = ctx
            .current_section()
            .ok_or_else(|| section_lost(&origin))?;
        let attrs = section
            .set_at(key, value, origin.clone())
            .map_err(|error| ParseError::WriteProtection { error, origin })?;
        match prefix {
            Some(KeyPrefix::Mandatory) => attrs.mandatory = true,
            Some(KeyPrefix::Final) => attrs.finalized = true,
            Some(KeyPrefix::Temporary) => attrs.temporary = true,
            None => {}
        }
        trace!(key = %key, prefix = ?prefix, "assigned");
        Ok(())
    }
}

/// Open sections are only ever entered through headers, so this means the
/// tree was changed behind the session's back.
fn section_lost(origin: &Origin) -> ParseError {
    ParseError::syntax("Current section is no longer a section", origin.clone())
}

/// Evaluate references, then drop temporary keys, which references may use.
fn finish(mut root: Section) -> Result<Section> {
    evaluate_all(&mut root)?;
    root.clear_temporary(true);
    Ok(root)
}

fn read_document(path: &Path) -> std::io::Result<(PathBuf, String)> {
    let path = path.canonicalize()?;
    let text = fs::read_to_string(&path)?;
    Ok((path, text))
}

fn normalize_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n")
    } else {
        text
    }
}
