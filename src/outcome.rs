//! Outcome classification of tool output.
//!
//! The wrapped utilities frequently exit 0 on failure, so success is decided
//! by matching captured output against an [`OutcomePattern`]. Patterns are
//! plain data: adapters ship defaults and profiles may override them per
//! action without touching adapter control flow.
//!
//! Absence of a success marker is always a failure, whatever the exit status.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::BackupError;
use crate::executor::{CommandSpec, ExecutionResult};

/// Matches output made only of whitespace.
const SILENT: &str = r"\A\s*\z";

#[allow(clippy::expect_used)]
static SILENT_PATTERN: LazyLock<OutcomePattern> = LazyLock::new(|| {
    OutcomePattern::new(SILENT)
        .expect("constant regex pattern is valid")
        .requiring_zero_exit()
});

/// Rule deciding whether captured output denotes success.
///
/// `success` must match somewhere in the output. When `failure` is set and
/// also matches, the output is a failure even though a success marker was
/// found. With `zero_exit` set, a non-zero exit status fails regardless of
/// output.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PatternSource")]
pub struct OutcomePattern {
    success: Regex,
    failure: Option<Regex>,
    zero_exit: bool,
}

/// YAML form of a pattern: a bare success regex or a `{success, failure}` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternSource {
    Success(String),
    Full {
        success: String,
        #[serde(default)]
        failure: Option<String>,
        #[serde(default)]
        zero_exit: bool,
    },
}

impl TryFrom<PatternSource> for OutcomePattern {
    type Error = BackupError;

    fn try_from(source: PatternSource) -> Result<Self, Self::Error> {
        match source {
            PatternSource::Success(success) => Self::new(&success),
            PatternSource::Full {
                success,
                failure,
                zero_exit,
            } => {
                let mut pattern = Self::new(&success)?;
                if let Some(failure) = failure {
                    pattern = pattern.with_failure(&failure)?;
                }
                pattern.zero_exit = zero_exit;
                Ok(pattern)
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, BackupError> {
    Regex::new(pattern)
        .map_err(|e| BackupError::Config(format!("invalid outcome pattern {:?}: {}", pattern, e)))
}

impl OutcomePattern {
    /// Creates a pattern from a success regex.
    pub fn new(success: &str) -> Result<Self, BackupError> {
        Ok(Self {
            success: compile(success)?,
            failure: None,
            zero_exit: false,
        })
    }

    /// Adds a failure regex that overrides a success match.
    pub fn with_failure(mut self, failure: &str) -> Result<Self, BackupError> {
        self.failure = Some(compile(failure)?);
        Ok(self)
    }

    /// Also requires the process to exit with status 0.
    #[must_use]
    pub fn requiring_zero_exit(mut self) -> Self {
        self.zero_exit = true;
        self
    }

    /// Pattern for tools that print nothing on success. Requires exit 0.
    pub fn silent() -> Self {
        SILENT_PATTERN.clone()
    }

    pub fn success_pattern(&self) -> &str {
        self.success.as_str()
    }

    pub fn failure_pattern(&self) -> Option<&str> {
        self.failure.as_ref().map(Regex::as_str)
    }

    pub fn requires_zero_exit(&self) -> bool {
        self.zero_exit
    }

    /// Returns true if `output` carries the success marker and no failure marker.
    pub fn matches(&self, output: &str) -> bool {
        classify(output, self).is_success()
    }
}

/// Result of classifying captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Classifies `output` against `pattern`.
pub fn classify(output: &str, pattern: &OutcomePattern) -> Outcome {
    if let Some(failure) = &pattern.failure
        && failure.is_match(output)
    {
        return Outcome::Failure(format!("output matched failure pattern /{}/", failure.as_str()));
    }

    if pattern.success.is_match(output) {
        Outcome::Success
    } else {
        Outcome::Failure(format!(
            "output did not match success pattern /{}/",
            pattern.success.as_str()
        ))
    }
}

/// Turns an execution result into `Ok` or [`BackupError::ToolReportedFailure`].
///
/// Dry-run results carry no output and are not classified.
pub fn ensure_success(
    spec: &CommandSpec,
    result: &ExecutionResult,
    pattern: &OutcomePattern,
) -> Result<(), BackupError> {
    if result.is_dry_run() {
        return Ok(());
    }

    let output = result.captured_output();
    let outcome = if pattern.zero_exit && !result.success() {
        Outcome::Failure(format!("process exited with status {:?}", result.code()))
    } else {
        classify(&output, pattern)
    };
    match outcome {
        Outcome::Success => {
            tracing::debug!(action = %spec.action, "command succeeded");
            Ok(())
        }
        Outcome::Failure(reason) => {
            tracing::warn!(
                action = %spec.action,
                exit_code = ?result.code(),
                "{}",
                reason
            );
            Err(BackupError::ToolReportedFailure {
                action: spec.action.clone(),
                command: spec.command_line(),
                output,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save_pattern() -> OutcomePattern {
        OutcomePattern::new(r"(?m)OK\s*$").unwrap()
    }

    #[test]
    fn ok_suffix_is_success() {
        assert_eq!(classify("+OK", &save_pattern()), Outcome::Success);
        assert_eq!(classify("OK", &save_pattern()), Outcome::Success);
    }

    #[test]
    fn trailing_whitespace_is_success() {
        assert_eq!(classify("OK\n", &save_pattern()), Outcome::Success);
        assert_eq!(classify("OK  \r\n", &save_pattern()), Outcome::Success);
    }

    #[test]
    fn match_is_position_insensitive_across_lines() {
        let output = "Warning: Using a password with '-a' option\nOK\n";
        assert!(classify(output, &save_pattern()).is_success());
    }

    #[test]
    fn missing_marker_is_failure() {
        let outcome = classify("(error) ERR unknown command", &save_pattern());
        assert!(matches!(outcome, Outcome::Failure(reason) if reason.contains("OK")));
    }

    #[test]
    fn marker_not_at_line_end_is_failure() {
        assert!(!classify("OKAY then", &save_pattern()).is_success());
    }

    #[test]
    fn failure_pattern_overrides_success() {
        let pattern = OutcomePattern::new(r"Committed revision \d+\.")
            .unwrap()
            .with_failure(r"(?m)^svnsync: E\d+:")
            .unwrap();
        let output = "Committed revision 1.\nsvnsync: E170013: Unable to connect\n";
        assert!(!classify(output, &pattern).is_success());
        assert!(classify("Committed revision 1.\n", &pattern).is_success());
    }

    #[test]
    fn silent_pattern_accepts_only_whitespace() {
        let pattern = OutcomePattern::silent();
        assert!(pattern.matches(""));
        assert!(pattern.matches("\n  \n"));
        assert!(!pattern.matches("chmod: cannot access 'x'"));
    }

    #[test]
    fn silent_pattern_rejects_non_zero_exit() {
        let spec = CommandSpec::new(
            "chmod_hook",
            crate::command::CommandBuilder::new("chmod").build().unwrap(),
        );
        let result = ExecutionResult::exited(1, "", "");
        let err = ensure_success(&spec, &result, &OutcomePattern::silent())
            .expect_err("silent crash is a failure");
        assert!(matches!(err, BackupError::ToolReportedFailure { .. }));

        let ok = ExecutionResult::exited(0, "", "");
        ensure_success(&spec, &ok, &OutcomePattern::silent()).unwrap();
    }

    #[test]
    fn marker_patterns_ignore_exit_status() {
        let spec = CommandSpec::new(
            "invoke_save",
            crate::command::CommandBuilder::new("redis-cli").build().unwrap(),
        );
        let result = ExecutionResult::exited(1, "OK\n", "");
        ensure_success(&spec, &result, &save_pattern()).unwrap();
    }

    #[test]
    fn invalid_regex_is_config_error() {
        let err = OutcomePattern::new("(unclosed").expect_err("invalid regex");
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn deserialize_bare_string() {
        let pattern: OutcomePattern = serde_yaml::from_str("'Transfer finished'").unwrap();
        assert_eq!(pattern.success_pattern(), "Transfer finished");
        assert!(pattern.failure_pattern().is_none());
    }

    #[test]
    fn deserialize_map() {
        let pattern: OutcomePattern =
            serde_yaml::from_str("success: 'done'\nfailure: 'E\\d+'\n").unwrap();
        assert_eq!(pattern.success_pattern(), "done");
        assert_eq!(pattern.failure_pattern(), Some(r"E\d+"));
        assert!(!pattern.requires_zero_exit());
    }

    #[test]
    fn deserialize_map_with_zero_exit() {
        let pattern: OutcomePattern =
            serde_yaml::from_str("success: '\\A\\s*\\z'\nzero_exit: true\n").unwrap();
        assert!(pattern.requires_zero_exit());
    }

    #[test]
    fn deserialize_rejects_invalid_regex() {
        let result: Result<OutcomePattern, _> = serde_yaml::from_str("'(unclosed'");
        assert!(result.is_err());
    }
}
