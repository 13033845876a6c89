//! Syntax validation for proposed file contents.
//!
//! Two checker implementations sit behind the `SyntaxChecker` seam:
//!
//! - `PhpLintChecker` shells out to the interpreter's lint mode (`php -l`)
//!   against a scratch file and parses its diagnostic output.
//! - `ScanChecker` is the best-effort fallback for environments without an
//!   interpreter: a lexical scan that flags unterminated strings and
//!   unbalanced delimiters. It never executes the content.
//!
//! Which one runs is decided once, up front, via `select_checker`; the
//! engine never branches on interpreter availability.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

/// Transient verdict of a syntax check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub line: Option<u32>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            ok: true,
            line: None,
            message: None,
        }
    }

    pub fn fail(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            line,
            message: Some(message.into()),
        }
    }
}

/// Checks proposed content before it is committed.
///
/// Contract: never errors upward. Any internal failure of the checking
/// machinery maps to an `ok = false` result, which the engine treats as a
/// recoverable validation failure (draft kept, nothing committed).
#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    async fn check(&self, content: &[u8]) -> ValidationResult;
}

/// Bound on one interpreter invocation so a hung lint cannot stall a request.
pub const LINT_TIMEOUT: Duration = Duration::from_secs(10);

const DETECT_TIMEOUT: Duration = Duration::from_secs(2);

/// External interpreter lint (`php -l`) against a scratch file.
pub struct PhpLintChecker {
    binary: String,
}

impl PhpLintChecker {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Probe interpreter availability (`php -v`). Honors `PHP_BINARY`.
    pub async fn detect() -> Option<Self> {
        let binary = std::env::var("PHP_BINARY").unwrap_or_else(|_| "php".to_string());
        let probe = Command::new(&binary)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(DETECT_TIMEOUT, probe).await {
            Ok(Ok(status)) if status.success() => Some(Self::new(binary)),
            _ => None,
        }
    }
}

#[async_trait]
impl SyntaxChecker for PhpLintChecker {
    async fn check(&self, content: &[u8]) -> ValidationResult {
        // Scratch file is deleted on drop, on every exit path below.
        let mut scratch = match tempfile::Builder::new()
            .prefix("lint-")
            .suffix(".php")
            .tempfile()
        {
            Ok(file) => file,
            Err(e) => return ValidationResult::fail(None, format!("syntax check failed: {}", e)),
        };
        if let Err(e) = scratch.write_all(content).and_then(|_| scratch.flush()) {
            return ValidationResult::fail(None, format!("syntax check failed: {}", e));
        }

        let invocation = Command::new(&self.binary)
            .arg("-l")
            .arg(scratch.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(LINT_TIMEOUT, invocation).await {
            Err(_) => {
                tracing::warn!("Syntax check timed out after {:?}", LINT_TIMEOUT);
                return ValidationResult::fail(None, "syntax check timed out");
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to invoke {}: {}", self.binary, e);
                return ValidationResult::fail(None, format!("syntax check failed: {}", e));
            }
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            return ValidationResult::pass();
        }

        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostics.push('\n');
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
        parse_lint_output(&diagnostics)
    }
}

/// Map `<message> in <path> on line <N>` diagnostics to a result.
fn parse_lint_output(output: &str) -> ValidationResult {
    // Lazily compiling here is fine; one check per save request.
    let pattern = Regex::new(r"(?m)^(.+) in .+ on line (\d+)").expect("valid diagnostic pattern");
    if let Some(captures) = pattern.captures(output) {
        let message = captures[1].trim().to_string();
        let line = captures[2].parse::<u32>().ok();
        return ValidationResult::fail(line, message);
    }
    // Lint rejected the file but printed nothing we can locate.
    let first_line = output.lines().find(|l| !l.trim().is_empty());
    ValidationResult::fail(None, first_line.unwrap_or("syntax error").trim())
}

/// Best-effort lexical scan of PHP source. Fallback when no interpreter
/// is available; runs with no privileges and executes nothing.
///
/// Only delimiter-level errors are caught (unterminated strings,
/// unbalanced brackets). Statement-level mistakes such as a missing
/// semicolon pass the scan and are rejected only by `PhpLintChecker`.
pub struct ScanChecker;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Html,
    Code,
    SingleQuote { start_line: u32 },
    DoubleQuote { start_line: u32 },
    LineComment,
    BlockComment,
}

#[async_trait]
impl SyntaxChecker for ScanChecker {
    async fn check(&self, content: &[u8]) -> ValidationResult {
        scan(&String::from_utf8_lossy(content))
    }
}

fn scan(source: &str) -> ValidationResult {
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;
    let mut state = ScanState::Html;
    let mut stack: Vec<(char, u32)> = Vec::new();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            if state == ScanState::LineComment {
                state = ScanState::Code;
            }
            continue;
        }

        match state {
            ScanState::Html => {
                if c == '<' && chars.peek() == Some(&'?') {
                    chars.next();
                    state = ScanState::Code;
                }
            }
            ScanState::Code => match c {
                '?' if chars.peek() == Some(&'>') => {
                    chars.next();
                    state = ScanState::Html;
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = ScanState::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = ScanState::BlockComment;
                }
                '#' => state = ScanState::LineComment,
                '\'' => state = ScanState::SingleQuote { start_line: line },
                '"' => state = ScanState::DoubleQuote { start_line: line },
                '(' | '[' | '{' => stack.push((c, line)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return ValidationResult::fail(
                                Some(line),
                                format!("syntax error, unexpected '{}'", c),
                            );
                        }
                    }
                }
                _ => {}
            },
            ScanState::SingleQuote { .. } => match c {
                '\\' => {
                    if chars.next() == Some('\n') {
                        line += 1;
                    }
                }
                '\'' => state = ScanState::Code,
                _ => {}
            },
            ScanState::DoubleQuote { .. } => match c {
                '\\' => {
                    if chars.next() == Some('\n') {
                        line += 1;
                    }
                }
                '"' => state = ScanState::Code,
                _ => {}
            },
            ScanState::LineComment => {}
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = ScanState::Code;
                }
            }
        }
    }

    match state {
        ScanState::SingleQuote { start_line } | ScanState::DoubleQuote { start_line } => {
            return ValidationResult::fail(Some(start_line), "syntax error, unterminated string");
        }
        _ => {}
    }
    if let Some((open, open_line)) = stack.pop() {
        return ValidationResult::fail(
            Some(open_line),
            format!("syntax error, unclosed '{}'", open),
        );
    }
    ValidationResult::pass()
}

/// Pick the strongest checker the environment supports.
pub async fn select_checker() -> Box<dyn SyntaxChecker> {
    match PhpLintChecker::detect().await {
        Some(lint) => {
            tracing::debug!("Using interpreter lint for syntax checks");
            Box::new(lint)
        }
        None => {
            tracing::info!("Interpreter unavailable, falling back to lexical scan");
            Box::new(ScanChecker)
        }
    }
}
