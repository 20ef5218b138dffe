mod template;

pub use template::{ArgTemplate, Bindings, CommandTemplate, Placeholder, Segment, TemplateError};

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static PUBLIC_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"public\s+class\s+(\w+)").expect("static pattern"));

/// Identifier a language needs pulled out of the source before it can run
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    PublicClass,
}

impl EntryPoint {
    pub fn extract(self, source: &str) -> Option<&str> {
        match self {
            Self::PublicClass => PUBLIC_CLASS
                .captures(source)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str()),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::PublicClass => "class name",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LanguageConfig {
    pub name: String,
    pub extension: String,
    /// Source file name; defaults to `code_{id}` plus the extension
    #[serde(default)]
    pub source_file: Option<ArgTemplate>,
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
    #[serde(default)]
    pub entry_point: Option<EntryPoint>,
}

/// Fully substituted commands for one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub working_dir: PathBuf,
    pub source_file: String,
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
}

impl LanguageConfig {
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Binds this execution's names into the language's templates.
    ///
    /// `id` must be unique per execution; it names both the source file and
    /// the compiled executable.
    pub fn plan(
        &self,
        id: &str,
        class_name: Option<&str>,
        working_dir: &Path,
    ) -> Result<CommandPlan, TemplateError> {
        let executable = format!("executable_{id}");
        let naming = Bindings {
            filename: None,
            executable: Some(&executable),
            class_name,
            id: Some(id),
        };

        let source_file = match &self.source_file {
            Some(template) => template.render(&naming)?,
            None => format!("code_{id}{}", self.extension),
        };

        let bindings = Bindings {
            filename: Some(&source_file),
            ..naming
        };
        let compile = self
            .compile
            .as_ref()
            .map(|c| c.render(&bindings))
            .transpose()?;
        let run = self.run.render(&bindings)?;

        Ok(CommandPlan {
            working_dir: working_dir.to_path_buf(),
            source_file,
            compile,
            run,
        })
    }

    /// Programs named literally by this language's commands
    pub fn programs(&self) -> impl Iterator<Item = String> + '_ {
        self.compile
            .iter()
            .chain(std::iter::once(&self.run))
            .filter_map(|c| c.program())
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("language name must not be empty".to_string());
        }
        if self.run.is_empty() {
            return Err(format!("run command of {} must not be empty", self.name));
        }
        if self.compile.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(format!("compile command of {} must not be empty", self.name));
        }

        let mut placeholders = self
            .compile
            .iter()
            .chain(std::iter::once(&self.run))
            .flat_map(|c| c.placeholders())
            .chain(self.source_file.iter().flat_map(|t| t.placeholders()));
        if self.entry_point.is_none()
            && placeholders.any(|p| p == Placeholder::ClassName)
        {
            return Err(format!(
                "{} uses {{classname}} but declares no entry_point",
                self.name
            ));
        }
        if self
            .source_file
            .as_ref()
            .is_some_and(|t| t.placeholders().any(|p| p == Placeholder::FileName))
        {
            return Err(format!("source_file of {} cannot use {{filename}}", self.name));
        }
        Ok(())
    }
}

/// The set of runnable languages, in listing order
#[derive(Deserialize, Debug, Clone)]
#[serde(try_from = "Vec<LanguageConfig>")]
pub struct LanguageTable(Vec<LanguageConfig>);

impl LanguageTable {
    pub fn new(languages: Vec<LanguageConfig>) -> Result<Self, String> {
        let mut table: Vec<LanguageConfig> = Vec::with_capacity(languages.len());
        for mut language in languages {
            language.validate()?;
            language.name = language.name.to_lowercase();
            if table.iter().any(|l| l.name == language.name) {
                return Err(format!("language {} is defined twice", language.name));
            }
            table.push(language);
        }
        Ok(Self(table))
    }

    /// Looks a language up by identifier, ignoring case
    pub fn resolve(&self, language: &str) -> Option<&LanguageConfig> {
        let language = language.to_lowercase();
        self.0.iter().find(|l| l.name == language)
    }

    pub fn supported(&self) -> Vec<&str> {
        self.0.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageConfig> {
        self.0.iter()
    }

    /// Languages whose literal toolchain programs cannot be found on `PATH`
    pub fn missing_toolchains(&self) -> Vec<(&str, String)> {
        self.0
            .iter()
            .flat_map(|l| l.programs().map(move |p| (l.name.as_str(), p)))
            .filter(|(_, program)| !program_on_path(program))
            .collect()
    }
}

impl TryFrom<Vec<LanguageConfig>> for LanguageTable {
    type Error = String;

    fn try_from(value: Vec<LanguageConfig>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self(builtin_languages())
    }
}

fn program_on_path(program: &str) -> bool {
    std::process::Command::new("which")
        .arg(program)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn lit(text: &str) -> ArgTemplate {
    ArgTemplate::literal(text)
}

fn slot(placeholder: Placeholder) -> ArgTemplate {
    ArgTemplate::slot(placeholder)
}

fn run_executable() -> CommandTemplate {
    CommandTemplate::new(vec![ArgTemplate::new(vec![
        Segment::Literal("./".to_string()),
        Segment::Slot(Placeholder::Executable),
    ])])
}

fn builtin_languages() -> Vec<LanguageConfig> {
    let interpreted = |name: &str, extension: &str, interpreter: &str| LanguageConfig {
        name: name.to_string(),
        extension: extension.to_string(),
        source_file: None,
        compile: None,
        run: CommandTemplate::new(vec![lit(interpreter), slot(Placeholder::FileName)]),
        entry_point: None,
    };
    let native = |name: &str, extension: &str, compiler: &str| LanguageConfig {
        name: name.to_string(),
        extension: extension.to_string(),
        source_file: None,
        compile: Some(CommandTemplate::new(vec![
            lit(compiler),
            lit("-o"),
            slot(Placeholder::Executable),
            slot(Placeholder::FileName),
        ])),
        run: run_executable(),
        entry_point: None,
    };

    vec![
        interpreted("python", ".py", "python3"),
        interpreted("javascript", ".js", "node"),
        native("c", ".c", "gcc"),
        native("cpp", ".cpp", "g++"),
        LanguageConfig {
            name: "java".to_string(),
            extension: ".java".to_string(),
            // javac insists the file is named after its public class
            source_file: Some(ArgTemplate::new(vec![
                Segment::Slot(Placeholder::ClassName),
                Segment::Literal(".java".to_string()),
            ])),
            compile: Some(CommandTemplate::new(vec![
                lit("javac"),
                slot(Placeholder::FileName),
            ])),
            run: CommandTemplate::new(vec![
                lit("java"),
                lit("-cp"),
                lit("."),
                slot(Placeholder::ClassName),
            ]),
            entry_point: Some(EntryPoint::PublicClass),
        },
    ]
}
