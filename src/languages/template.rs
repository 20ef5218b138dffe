use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Named slot inside a command or file name template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    FileName,
    Executable,
    ClassName,
    Id,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "filename" => Some(Self::FileName),
            "executable" => Some(Self::Executable),
            "classname" => Some(Self::ClassName),
            "id" => Some(Self::Id),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FileName => "filename",
            Self::Executable => "executable",
            Self::ClassName => "classname",
            Self::Id => "id",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("no value bound for placeholder {{{0}}}")]
    Unbound(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// One argument of a command, parsed once into literal text and slots.
///
/// Rendering never re-scans substituted values, so a file name that happens
/// to contain `{executable}` is copied through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ArgTemplate {
    segments: Vec<Segment>,
}

impl ArgTemplate {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn literal(text: &str) -> Self {
        Self::new(vec![Segment::Literal(text.to_string())])
    }

    pub fn slot(placeholder: Placeholder) -> Self {
        Self::new(vec![Segment::Slot(placeholder)])
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, bindings: &Bindings<'_>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(p) => out.push_str(bindings.value(*p)?),
            }
        }
        Ok(out)
    }
}

impl FromStr for ArgTemplate {
    type Err = TemplateError;

    /// Parses `{name}` slots; braces around anything that is not a plain
    /// lowercase word (`{}`, `{1}`, `${HOME}`-style text) stay literal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = s;

        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                break;
            };
            let name = &after[..close];
            let is_word = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');

            if !is_word {
                literal.push_str(&rest[..open + 1]);
                rest = after;
                continue;
            }

            let placeholder = Placeholder::from_name(name)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
            literal.push_str(&rest[..open]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(placeholder));
            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}

impl TryFrom<String> for ArgTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ArgTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Slot(p) => write!(f, "{{{}}}", p.name())?,
            }
        }
        Ok(())
    }
}

/// Ordered argument list; the first element names the program
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<ArgTemplate>);

impl CommandTemplate {
    pub fn new(args: Vec<ArgTemplate>) -> Self {
        Self(args)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The program part, if it is fixed text (used for toolchain probing)
    pub fn program(&self) -> Option<String> {
        let first = self.0.first()?;
        if first.placeholders().next().is_some() {
            return None;
        }
        Some(first.to_string())
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.0.iter().flat_map(|arg| arg.placeholders())
    }

    pub fn render(&self, bindings: &Bindings<'_>) -> Result<Vec<String>, TemplateError> {
        self.0.iter().map(|arg| arg.render(bindings)).collect()
    }
}

/// Concrete values for one execution
#[derive(Debug, Default, Clone, Copy)]
pub struct Bindings<'a> {
    pub filename: Option<&'a str>,
    pub executable: Option<&'a str>,
    pub class_name: Option<&'a str>,
    pub id: Option<&'a str>,
}

impl<'a> Bindings<'a> {
    fn value(&self, placeholder: Placeholder) -> Result<&'a str, TemplateError> {
        let value = match placeholder {
            Placeholder::FileName => self.filename,
            Placeholder::Executable => self.executable,
            Placeholder::ClassName => self.class_name,
            Placeholder::Id => self.id,
        };
        value.ok_or(TemplateError::Unbound(placeholder.name()))
    }
}
