//! Construction of the command a job runs.
//!
//! Commands come from configuration, never from the caller: the executable
//! is fixed and the arguments follow a template. Template entries may embed
//! `{Name}` placeholders that are filled from the request. `{JobId}` and
//! `{CommandType}` are resolved from the request itself; any other name is
//! looked up in the request `Body`. Every substituted value, and every
//! request-supplied argument when those are enabled, must match the
//! configured allow-list in full. Arguments are handed to the OS as-is with no
//! shell in between.

use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

use jobrelay_config::{Config, anchored_pattern};

use crate::error::CommandBuildError;
use crate::request::JobRequest;

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Program and ordered arguments for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    executable: String,
    arguments: Vec<String>,
}

impl Command {
    /// Creates a command.
    #[must_use]
    pub fn new(executable: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            arguments,
        }
    }

    /// Returns the program to run.
    #[must_use]
    pub const fn executable(&self) -> &str {
        self.executable.as_str()
    }

    /// Returns the arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.executable)?;
        for argument in &self.arguments {
            write!(formatter, " {argument}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone)]
struct ArgumentTemplate {
    segments: Vec<Segment>,
}

impl ArgumentTemplate {
    fn parse(template: &str) -> Result<Self, CommandBuildError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(current) = chars.next() {
            match current {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        name.push(next);
                    }
                    if !closed {
                        return Err(CommandBuildError::UnclosedPlaceholder {
                            template: template.to_owned(),
                        });
                    }
                    let trimmed = name.trim();
                    if trimmed.is_empty() {
                        return Err(CommandBuildError::EmptyPlaceholder {
                            template: template.to_owned(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(trimmed.to_owned()));
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() || segments.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    fn render(&self, request: &JobRequest, allow_list: &Regex) -> Result<String, CommandBuildError> {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => {
                    let value = resolve(name, request).ok_or_else(|| {
                        CommandBuildError::MissingValue {
                            placeholder: name.clone(),
                        }
                    })?;
                    if !allow_list.is_match(&value) {
                        return Err(CommandBuildError::DisallowedValue {
                            placeholder: name.clone(),
                            value,
                        });
                    }
                    rendered.push_str(&value);
                }
            }
        }
        Ok(rendered)
    }
}

fn resolve(name: &str, request: &JobRequest) -> Option<String> {
    match name {
        "JobId" => Some(request.job_id().to_owned()),
        "CommandType" => request.command_type().map(str::to_owned),
        field => request.body_field(field),
    }
}

/// Derives [`Command`]s from configuration and job requests.
///
/// # Example
///
/// ```
/// use jobrelay_core::{CommandBuilder, JobRequest};
/// use serde_json::{Map, Value};
///
/// let builder = CommandBuilder::new(
///     Some(String::from("java")),
///     &[String::from("-jar"), String::from("app.jar"), String::from("--env={Environment}")],
///     r"^[A-Za-z0-9_.-]*$",
/// )
/// .expect("template is valid");
///
/// let mut body = Map::new();
/// body.insert(String::from("Environment"), Value::from("prod"));
/// let request = JobRequest::new("abc123").with_body(body);
///
/// let command = builder.build(&request).expect("command builds");
/// assert_eq!(command.to_string(), "java -jar app.jar --env=prod");
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    executable: Option<String>,
    templates: Vec<ArgumentTemplate>,
    allow_list: Regex,
    allow_request_arguments: bool,
}

impl CommandBuilder {
    /// Creates a builder from an executable, an argument template and an
    /// allow-list pattern. Values must match the pattern in full, whether or
    /// not it carries its own anchors.
    ///
    /// A missing executable is accepted here and reported per job by
    /// [`CommandBuilder::build`].
    ///
    /// # Errors
    ///
    /// Returns [`CommandBuildError`] when a template entry is malformed or
    /// the pattern does not compile.
    pub fn new(
        executable: Option<String>,
        arguments: &[String],
        pattern: &str,
    ) -> Result<Self, CommandBuildError> {
        let allow_list = Regex::new(&anchored_pattern(pattern)).map_err(|source| {
            CommandBuildError::InvalidPattern {
                pattern: pattern.to_owned(),
                source: Box::new(source),
            }
        })?;
        let templates = arguments
            .iter()
            .map(|argument| ArgumentTemplate::parse(argument))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            executable: executable.filter(|path| !path.trim().is_empty()),
            templates,
            allow_list,
            allow_request_arguments: false,
        })
    }

    /// Creates a builder from the resolved worker configuration.
    ///
    /// # Errors
    ///
    /// See [`CommandBuilder::new`].
    pub fn from_config(config: &Config) -> Result<Self, CommandBuildError> {
        Ok(
            Self::new(
                config.executable.clone(),
                &config.arguments,
                &config.argument_pattern,
            )?
            .with_request_arguments(config.allow_request_arguments),
        )
    }

    /// Enables or disables appending request `Arguments`.
    #[must_use]
    pub const fn with_request_arguments(mut self, allowed: bool) -> Self {
        self.allow_request_arguments = allowed;
        self
    }

    /// Builds the command for one request.
    ///
    /// # Errors
    ///
    /// Returns [`CommandBuildError::MissingExecutable`] when no executable is
    /// configured, [`CommandBuildError::MissingValue`] when a placeholder
    /// cannot be resolved, and a `Disallowed*` variant when a value fails
    /// the allow-list.
    pub fn build(&self, request: &JobRequest) -> Result<Command, CommandBuildError> {
        let executable = self
            .executable
            .as_ref()
            .ok_or(CommandBuildError::MissingExecutable)?;

        let mut arguments = self
            .templates
            .iter()
            .map(|template| template.render(request, &self.allow_list))
            .collect::<Result<Vec<_>, _>>()?;

        let extra = request.arguments();
        if self.allow_request_arguments {
            for value in extra {
                if !self.allow_list.is_match(value) {
                    return Err(CommandBuildError::DisallowedArgument {
                        value: value.clone(),
                    });
                }
                arguments.push(value.clone());
            }
        } else if !extra.is_empty() {
            warn!(
                target: COMMAND_TARGET,
                job_id = request.job_id(),
                ignored = extra.len(),
                "request arguments are disabled; ignoring them"
            );
        }

        let command = Command::new(executable.clone(), arguments);
        debug!(
            target: COMMAND_TARGET,
            job_id = request.job_id(),
            command = %command,
            "built job command"
        );
        Ok(command)
    }
}
