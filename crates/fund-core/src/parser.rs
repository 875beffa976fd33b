//! Shell command parsing.
//!
//! Extracts canonical executable identities from raw history command strings.
//! Only common wrapper/operator patterns are recognized; anything the parser
//! cannot make sense of degrades to `None` rather than erroring.

use std::sync::LazyLock;

use regex::Regex;

/// Commands that wrap other commands - the wrapped command is the one we want.
const WRAPPER_COMMANDS: &[&str] = &[
    "sudo", "doas", // privilege escalation
    "env",    // environment modification
    "time", "timeout", // timing
    "nohup", "setsid", // process control
    "nice", "ionice", "chrt", // priority
    "strace", "ltrace", // tracing
    "watch",      // repeated execution
    "xargs",      // argument passing
    "exec",       // replace shell
    "command",    // bypass aliases
    "builtin",    // force builtin
    "caffeinate", // macOS keep-awake
];

/// Shell builtins that aren't really tools to donate to.
const SHELL_BUILTINS: &[&str] = &[
    "cd", "pwd", "echo", "printf", "read", "export", "unset", "set", "source", ".", "alias",
    "unalias", "type", "which", "where", "true", "false", ":", "test", "[", "[[", "break",
    "continue", "return", "exit", "shift", "getopts", "local", "declare", "typeset", "eval",
    "exec", "trap", "wait", "jobs", "fg", "bg", "pushd", "popd", "dirs", "history", "fc", "umask",
    "ulimit", "enable", "disable", "shopt", "complete", "compgen", "let", "((",
];

/// Shell control structure keywords.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "case", "esac", "for", "while", "until", "do", "done",
    "select", "in", "function", "{", "}",
];

/// Pre-compiled regex for leading `VAR=value` assignments.
static VAR_ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=\S*\s*").unwrap());

/// Returns true if `name` is a shell builtin rather than a standalone tool.
pub fn is_shell_builtin(name: &str) -> bool {
    SHELL_BUILTINS.contains(&name)
}

/// Returns true if `name` is a shell control keyword.
pub fn is_control_keyword(name: &str) -> bool {
    CONTROL_KEYWORDS.contains(&name)
}

/// Splits a command into segments on pipes and sequencing operators.
///
/// Handles `|`, `&&`, `||` and `;`. Does not split inside quotes or inside
/// subshell/brace groups.
pub fn split_segments(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    let mut flush = |current: &mut String, segments: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
        current.clear();
    };

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' && !in_double {
            in_single = !in_single;
            current.push(c);
        } else if c == '"' && !in_single {
            in_double = !in_double;
            current.push(c);
        } else if in_single || in_double {
            current.push(c);
        } else if c == '(' || c == '{' {
            depth += 1;
            current.push(c);
        } else if c == ')' || c == '}' {
            depth -= 1;
            current.push(c);
        } else if depth == 0 {
            let next = chars.get(i + 1).copied();
            if (c == '&' && next == Some('&')) || (c == '|' && next == Some('|')) {
                flush(&mut current, &mut segments);
                i += 2;
                continue;
            } else if c == '|' || c == ';' {
                flush(&mut current, &mut segments);
            } else {
                current.push(c);
            }
        } else {
            current.push(c);
        }
        i += 1;
    }

    flush(&mut current, &mut segments);
    segments
}

/// Tokenizes a segment on whitespace, honoring single and double quotes.
///
/// Quote characters are stripped from the produced tokens. Unbalanced quotes
/// do not fail; the trailing partial token is kept as-is.
fn tokenize(segment: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = segment.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Normalizes an executable token to its canonical name.
///
/// Strips leading path components (`/usr/bin/curl` → `curl`,
/// `./script.py` → `script.py`) and lowercases the result. Command
/// substitutions are not valid candidates.
pub fn normalize_executable(token: &str) -> Option<String> {
    if token.starts_with("$(") || token.starts_with('`') {
        return None;
    }

    let name = token.rsplit('/').next().unwrap_or(token);
    if name.is_empty() {
        return None;
    }

    Some(name.to_lowercase())
}

/// Extracts the primary executable name from a single command segment.
///
/// Skips wrapper commands, their flags and inline variable assignments until
/// a real candidate is found. Returns `None` for empty, comment-only or
/// wrapper-only segments; never panics on malformed input.
pub fn parse(segment: &str) -> Option<String> {
    let mut segment = segment.trim();
    if segment.is_empty() || segment.starts_with('#') {
        return None;
    }

    // Leading VAR=value assignments (`FOO=bar python script.py`)
    while let Some(m) = VAR_ASSIGNMENT_RE.find(segment) {
        segment = &segment[m.end()..];
    }

    for token in tokenize(segment) {
        // Control keywords (`then make`) are transparent prefixes too
        if WRAPPER_COMMANDS.contains(&token.as_str()) || CONTROL_KEYWORDS.contains(&token.as_str())
        {
            continue;
        }
        // Wrapper flags (`sudo -u user`) and assignments after a wrapper
        // (`env VAR=1 python`)
        if token.starts_with('-') || VAR_ASSIGNMENT_RE.is_match(&token) {
            continue;
        }
        // First real candidate decides the segment; a command substitution
        // here yields None rather than a mangled partial token.
        return normalize_executable(&token);
    }

    None
}

/// Extracts every executable name from a full command string.
///
/// Each segment produced by [`split_segments`] contributes at most one
/// executable, reported as a separate usage event. Shell builtins are
/// filtered unless `include_builtins` is set; control keywords always are.
pub fn extract_executables(command: &str, include_builtins: bool) -> Vec<String> {
    let mut executables = Vec::new();

    for segment in split_segments(command) {
        let Some(exe) = parse(&segment) else {
            continue;
        };
        if !include_builtins && is_shell_builtin(&exe) {
            continue;
        }
        if is_control_keyword(&exe) {
            continue;
        }
        executables.push(exe);
    }

    executables
}
