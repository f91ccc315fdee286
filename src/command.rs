//! Exec command-line resolution.
//!
//! Turns a raw `ExecStart=`-style string into a ready-to-spawn argv:
//! systemd exec prefixes are stripped, the line is shell-tokenized, `$VAR`
//! and `${VAR}` references are expanded, and socket-activation arguments
//! (`-H fd://...`) that cannot work without an init system are removed.

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use tracing::debug;

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());
static PLAIN_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static BARE_VAR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// A resolved exec command, ready for the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    /// Whether a non-zero exit counts as failure (`-` prefix turns this off).
    pub check_errors: bool,
    /// The final argv; empty when the line resolved to nothing.
    pub argv: Vec<String>,
}

impl ExecCommand {
    /// First argv element, if any.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Strips systemd exec prefixes (`-`, `+`, `!`, `@`, `:`) from a command
/// string. Only `-` changes behavior (errors are ignored); the rest are
/// accepted and dropped.
pub fn strip_exec_prefixes(raw: &str) -> (bool, &str) {
    let mut check_errors = true;
    let mut rest = raw.trim();
    while let Some(first) = rest.chars().next() {
        if !matches!(first, '-' | '+' | '!' | '@' | ':') {
            break;
        }
        if first == '-' {
            check_errors = false;
        }
        rest = rest[1..].trim_start();
    }
    (check_errors, rest.trim())
}

/// Tokenizes a command string with shell quoting rules, falling back to a
/// plain whitespace split when the quoting is malformed.
pub fn tokenize(command: &str) -> Vec<String> {
    match shlex::split(command) {
        Some(parts) => parts,
        None => command.split_whitespace().map(str::to_string).collect(),
    }
}

/// Expands `${VAR}` and `$VAR` references in a single token.
///
/// Lookups try the service environment first, then the supervisor's own
/// environment, then the empty string.
fn expand_token(token: &str, env: &HashMap<String, String>) -> String {
    let lookup = |name: &str| -> String {
        env.get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
            .unwrap_or_default()
    };

    let braced = BRACED_VAR.replace_all(token, |caps: &regex::Captures| {
        lookup(&caps[1])
    });
    PLAIN_VAR
        .replace_all(&braced, |caps: &regex::Captures| lookup(&caps[1]))
        .into_owned()
}

/// Expands variables across an argv.
///
/// A token that consists entirely of a bare `$VAR` reference is replaced by
/// the whitespace-split words of its value, so `ExecStart=/bin/echo $OPTS`
/// with `OPTS=--a --b` yields three argv entries, and an empty value drops
/// the token instead of passing an empty positional argument. Embedded and
/// `${VAR}` references substitute in place.
pub fn expand_argv(tokens: Vec<String>, env: &HashMap<String, String>) -> Vec<String> {
    let mut result = Vec::with_capacity(tokens.len());
    for token in tokens {
        if BARE_VAR_TOKEN.is_match(&token) {
            let expanded = expand_token(&token, env);
            result.extend(
                expanded.split_whitespace().map(str::to_string),
            );
            continue;
        }
        let expanded = expand_token(&token, env);
        if expanded.is_empty() && token != expanded {
            continue;
        }
        result.push(expanded);
    }
    result
}

/// Removes socket-activation listener arguments.
///
/// Without an init system there is no inherited socket fd, so `fd://`
/// listeners can never work; stripping them lets services such as dockerd
/// fall back to their default socket.
pub fn strip_socket_activation(tokens: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == "-H"
            && iter
                .peek()
                .is_some_and(|next| next.starts_with("fd://"))
        {
            let target = iter.next().unwrap_or_default();
            debug!("Stripping socket activation: -H {target}");
            continue;
        }
        if token.starts_with("-H=fd://") || token.starts_with("--host=fd://") {
            debug!("Stripping socket activation: {token}");
            continue;
        }
        result.push(token);
    }
    result
}

/// Full resolution pipeline for one exec line.
pub fn resolve_command(raw: &str, env: &HashMap<String, String>) -> ExecCommand {
    let (check_errors, stripped) = strip_exec_prefixes(raw);
    if stripped.is_empty() {
        return ExecCommand {
            check_errors,
            argv: Vec::new(),
        };
    }
    let tokens = tokenize(stripped);
    let argv = strip_socket_activation(expand_argv(tokens, env));
    ExecCommand { check_errors, argv }
}
