//! Shell command construction for external backup utilities.
//!
//! This module provides:
//! - [`CommandBuilder`]: assembles a command line from option groups
//! - [`ToolInvocation`]: the immutable, fully rendered result
//! - [`Utilities`]: read-only resolution of utility names to executables
//!
//! Every value that originates from configuration is rendered as exactly one
//! shell word. Fixed program flags are the only tokens emitted verbatim.

mod quote;
mod utilities;

use std::fmt;

use strum::Display;

use crate::error::BackupError;

pub use quote::{quote, quote_if_needed};
pub use utilities::Utilities;

/// Option group a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArgGroup {
    /// Authentication options (passwords, usernames).
    Credential,
    /// Host/port/socket options.
    Connectivity,
    /// User-supplied extra flags and fixed trailing flags.
    Extra,
    /// Subcommands, targets and redirections.
    Positional,
}

/// Defines how a configuration value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// Always wrap in single quotes: `-a 'secret'`.
    Always,
    /// Wrap only when the value contains shell metacharacters.
    IfNeeded,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(&'static str),
    Value(String, Quoting),
}

impl Token {
    fn render(&self) -> Result<String, BackupError> {
        match self {
            Token::Literal(s) => Ok((*s).to_string()),
            Token::Value(value, quoting) => {
                if value.contains('\0') {
                    return Err(BackupError::CommandConstruction(format!(
                        "value {:?} contains a NUL byte",
                        value
                    )));
                }
                Ok(match quoting {
                    Quoting::Always => quote(value),
                    Quoting::IfNeeded => quote_if_needed(value).into_owned(),
                })
            }
        }
    }
}

/// A fully rendered command line.
///
/// Tokens keep the order in which they were pushed; the per-group accessors
/// return each group's tokens in that same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    utility: String,
    tokens: Vec<(ArgGroup, String)>,
}

impl ToolInvocation {
    /// The rendered executable token.
    pub fn utility(&self) -> &str {
        &self.utility
    }

    fn group(&self, group: ArgGroup) -> Vec<&str> {
        self.tokens
            .iter()
            .filter(|(g, _)| *g == group)
            .map(|(_, t)| t.as_str())
            .collect()
    }

    pub fn credential_args(&self) -> Vec<&str> {
        self.group(ArgGroup::Credential)
    }

    pub fn connectivity_args(&self) -> Vec<&str> {
        self.group(ArgGroup::Connectivity)
    }

    pub fn extra_args(&self) -> Vec<&str> {
        self.group(ArgGroup::Extra)
    }

    pub fn positional_args(&self) -> Vec<&str> {
        self.group(ArgGroup::Positional)
    }

    /// Returns the command line as passed to `sh -c`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.utility.as_str())
            .chain(self.tokens.iter().map(|(_, t)| t.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Builder for assembling command lines consistently across adapters.
#[derive(Debug)]
pub struct CommandBuilder {
    utility: String,
    tokens: Vec<(ArgGroup, Token)>,
}

impl CommandBuilder {
    /// Creates a builder for an already resolved executable.
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            utility: executable.into(),
            tokens: Vec::new(),
        }
    }

    /// Creates a builder for `utility`, resolved through `utilities`.
    pub fn for_utility(utilities: &Utilities, utility: &str) -> Result<Self, BackupError> {
        Ok(Self::new(utilities.resolve(utility)?))
    }

    /// Append a fixed program token, emitted verbatim.
    pub fn push_literal(&mut self, group: ArgGroup, token: &'static str) {
        self.tokens.push((group, Token::Literal(token)));
    }

    /// Append a configuration value as a single word.
    pub fn push_value(&mut self, group: ArgGroup, value: impl Into<String>, quoting: Quoting) {
        self.tokens.push((group, Token::Value(value.into(), quoting)));
    }

    /// Append a flag and its value if the value is present and not empty.
    pub fn push_flag_value(
        &mut self,
        group: ArgGroup,
        flag: &'static str,
        value: Option<&str>,
        quoting: Quoting,
    ) {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return;
        };
        self.push_literal(group, flag);
        self.push_value(group, value, quoting);
    }

    /// Append each non-empty value as its own word.
    pub fn push_values(&mut self, group: ArgGroup, values: &[String], quoting: Quoting) {
        for value in values.iter().filter(|v| !v.is_empty()) {
            self.push_value(group, value.clone(), quoting);
        }
    }

    /// Renders every token, failing if a value cannot be represented.
    pub fn build(self) -> Result<ToolInvocation, BackupError> {
        if self.utility.trim().is_empty() {
            return Err(BackupError::CommandConstruction(
                "utility name must not be empty".to_string(),
            ));
        }
        let utility = Token::Value(self.utility, Quoting::IfNeeded).render()?;
        let tokens = self
            .tokens
            .into_iter()
            .map(|(group, token)| token.render().map(|t| (group, t)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ToolInvocation { utility, tokens })
    }
}
