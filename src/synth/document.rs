use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parse::parse_document;
use crate::types::SchemaError;
use crate::ComplyError;

/// Directive name used for comment nodes.
pub const COMMENT: &str = "#";

const INDENT: &str = "    ";

/// One node of an nginx configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub directive: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Vec<Directive>>,
}

impl Directive {
    #[must_use]
    pub fn new<S: Into<String>>(name: &str, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            directive: name.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            comment: None,
            block: None,
        }
    }

    #[must_use]
    pub fn comment(text: &str) -> Self {
        Self {
            directive: COMMENT.to_owned(),
            args: Vec::new(),
            comment: Some(text.to_owned()),
            block: None,
        }
    }

    #[must_use]
    pub fn with_block(mut self, block: Vec<Directive>) -> Self {
        self.block = Some(block);
        self
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.directive == COMMENT
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        if self.is_comment() {
            out.push('#');
            if let Some(text) = self.comment.as_deref().filter(|t| !t.is_empty()) {
                out.push(' ');
                out.push_str(text);
            }
            out.push('\n');
            return;
        }
        out.push_str(&self.directive);
        for arg in &self.args {
            out.push(' ');
            push_arg(out, arg);
        }
        match &self.block {
            None => out.push_str(";\n"),
            Some(children) => {
                out.push_str(" {\n");
                for child in children {
                    child.render_into(out, depth + 1);
                }
                for _ in 0..depth {
                    out.push_str(INDENT);
                }
                out.push_str("}\n");
            }
        }
    }
}

/// Quote an argument only when it could not be read back as written.
///
/// Spaces are kept bare: a synthesized value such as `TLSv1.2 TLSv1.3` is a
/// list of arguments to nginx, not one string.
fn push_arg(out: &mut String, arg: &str) {
    let needs_quotes = arg.is_empty()
        || arg.starts_with('#')
        || arg.contains(|c: char| matches!(c, ';' | '{' | '}' | '"' | '\''));
    if !needs_quotes {
        out.push_str(arg);
        return;
    }
    out.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// A parsed nginx configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    directives: Vec<Directive>,
}

impl Document {
    #[must_use]
    pub fn new(directives: Vec<Directive>) -> Self {
        Self { directives }
    }

    /// Parse configuration text. Malformed input is rejected as a whole.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        parse_document(text)
            .map(Self::new)
            .map_err(|e| SchemaError::MalformedDocument {
                message: e.message().to_owned(),
            })
    }

    /// Read and parse the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComplyError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    #[must_use]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Children of the first top-level `anchor` block.
    #[must_use]
    pub fn anchor_block(&self, anchor: &str) -> Option<&[Directive]> {
        self.directives
            .iter()
            .find(|d| d.directive == anchor)
            .and_then(|d| d.block.as_deref())
    }

    pub fn anchor_block_mut(&mut self, anchor: &str) -> Result<&mut Vec<Directive>, SchemaError> {
        self.directives
            .iter_mut()
            .find(|d| d.directive == anchor)
            .and_then(|d| d.block.as_mut())
            .ok_or_else(|| SchemaError::MissingAnchor {
                anchor: anchor.to_owned(),
            })
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for directive in &self.directives {
            directive.render_into(&mut out, 0);
        }
        out
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ComplyError> {
        fs::write(path, self.render())?;
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
