//! Prompt templates.
//!
//! Templates are plain text with `{NAME}` placeholders. `{{` and `}}`
//! stand for literal braces. The set of placeholders is fixed per template
//! kind and checked when the template is parsed, so rendering never fails.

use std::fmt::{self, Display, Formatter};

/// The default start template.
pub const DEFAULT_START_TEMPLATE: &str = "The following is a conversation \
    with an AI. The AI is helpful, apolitical, clever, and very friendly. \n\
    The AI's name is {AGENT_NAME} and is talking with {USERNAME}.\n";

/// The default message template.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "{user_name}:{MSG}\n{AGENT_NAME}:";

/// Errors from parsing a template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateError {
    /// A placeholder that the template kind doesn't support.
    UnknownPlaceholder {
        /// Name inside the braces.
        name: String,
        /// Byte offset of the opening brace.
        offset: usize,
    },
    /// An opening brace without its closing brace.
    UnclosedBrace {
        /// Byte offset of the opening brace.
        offset: usize,
    },
    /// A single closing brace outside a placeholder.
    UnmatchedClosingBrace {
        /// Byte offset of the closing brace.
        offset: usize,
    },
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UnknownPlaceholder { name, offset } => {
                write!(f, "unknown placeholder `{{{name}}}` at {offset}")
            }
            TemplateError::UnclosedBrace { offset } => {
                write!(f, "unclosed `{{` at {offset}")
            }
            TemplateError::UnmatchedClosingBrace { offset } => {
                write!(f, "unmatched `}}` at {offset}")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Placeholder(usize),
}

/// A parsed template whose placeholders are indices into a fixed list of
/// names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    fn parse(source: &str, names: &[&str]) -> Result<Self, TemplateError> {
        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if chars.next_if(|&(_, c)| c == '{').is_some() => {
                    literal.push('{');
                }
                '}' if chars.next_if(|&(_, c)| c == '}').is_some() => {
                    literal.push('}');
                }
                '}' => {
                    return Err(TemplateError::UnmatchedClosingBrace { offset });
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => {
                                return Err(TemplateError::UnclosedBrace {
                                    offset,
                                });
                            }
                            Some((_, c)) => name.push(c),
                        }
                    }
                    let Some(idx) = names.iter().position(|n| *n == name)
                    else {
                        return Err(TemplateError::UnknownPlaceholder {
                            name,
                            offset,
                        });
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(
                            &mut literal,
                        )));
                    }
                    segments.push(Segment::Placeholder(idx));
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    fn render(&self, values: &[&str]) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(idx) => out.push_str(values[*idx]),
            }
        }
        out
    }
}

/// The template that seeds a new transcript.
///
/// Placeholders: `{AGENT_NAME}` and `{USERNAME}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StartTemplate(Template);

impl StartTemplate {
    const NAMES: &'static [&'static str] = &["AGENT_NAME", "USERNAME"];

    /// Parses a start template.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Template::parse(source, Self::NAMES).map(Self)
    }

    /// Renders the template.
    ///
    /// `username` is the phrase describing the human, for example
    /// `"a person named Sam"`.
    #[inline]
    pub fn render(&self, agent_name: &str, username: &str) -> String {
        self.0.render(&[agent_name, username])
    }

    /// Returns the source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.0.source
    }
}

impl Default for StartTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_START_TEMPLATE)
            .unwrap_or_else(|err| unreachable!("default template: {err}"))
    }
}

/// The template that renders one turn's prefix, right before the agent's
/// reply.
///
/// Placeholders: `{user_name}`, `{AGENT_NAME}` and `{MSG}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageTemplate(Template);

impl MessageTemplate {
    const NAMES: &'static [&'static str] = &["user_name", "AGENT_NAME", "MSG"];

    /// Parses a message template.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Template::parse(source, Self::NAMES).map(Self)
    }

    /// Renders the template.
    #[inline]
    pub fn render(
        &self,
        user_name: &str,
        agent_name: &str,
        message: &str,
    ) -> String {
        self.0.render(&[user_name, agent_name, message])
    }

    /// Returns the source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.0.source
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_MESSAGE_TEMPLATE)
            .unwrap_or_else(|err| unreachable!("default template: {err}"))
    }
}
