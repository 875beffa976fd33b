//! Shell alias detection and resolution.
//!
//! Runs the user's shell interactively to list active aliases, then resolves
//! each alias value to a base executable so aliased usage (`g` for `git`)
//! still counts toward the right project.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use fund_core::ProjectMapper;
use fund_core::parser::normalize_executable;

/// Pre-compiled regex for `name=value` alias lines (bash/zsh).
static ALIAS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_.:-]+)=(.+)$").unwrap());

/// Shells we know how to list aliases for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Unknown,
}

/// Detects the user's login shell from `$SHELL`.
pub fn detect_shell() -> Shell {
    detect_shell_from(std::env::var("SHELL").ok().as_deref())
}

/// Shell detection from an explicit `$SHELL` value.
pub fn detect_shell_from(shell_var: Option<&str>) -> Shell {
    let Some(shell_path) = shell_var else {
        return Shell::Unknown;
    };
    match Path::new(shell_path).file_name().and_then(|n| n.to_str()) {
        Some("bash") => Shell::Bash,
        Some("zsh") => Shell::Zsh,
        Some("fish") => Shell::Fish,
        _ => Shell::Unknown,
    }
}

/// Scrubs rc-file guard variables so the shell sources its config fresh
/// and actually loads aliases.
fn guard_scrubbed_vars() -> Vec<(String, String)> {
    const GUARD_PATTERNS: &[&str] = &["ALREADY_RUN", "_SOURCED", "_LOADED", "_INITIALIZED"];
    std::env::vars()
        .filter(|(key, _)| !GUARD_PATTERNS.iter().any(|p| key.contains(p)))
        .collect()
}

/// Lists active shell aliases by running the shell.
///
/// Returns an empty map when the shell is unknown or the subprocess fails;
/// alias resolution is best-effort.
pub fn get_aliases(shell: Shell) -> HashMap<String, String> {
    let output = match shell {
        Shell::Bash | Shell::Zsh => {
            let name = if shell == Shell::Bash { "bash" } else { "zsh" };
            Command::new(name)
                .args(["-ic", "alias"])
                .env_clear()
                .envs(guard_scrubbed_vars())
                .output()
        }
        Shell::Fish => Command::new("fish")
            .args(["-c", "alias"])
            .env_clear()
            .envs(guard_scrubbed_vars())
            .output(),
        Shell::Unknown => return HashMap::new(),
    };

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match shell {
                Shell::Fish => parse_fish_aliases(&stdout),
                _ => parse_bash_zsh_aliases(&stdout),
            }
        }
        Err(err) => {
            tracing::debug!(%err, "failed to list shell aliases");
            HashMap::new()
        }
    }
}

/// Parses `alias` output from bash (`alias name='value'`) or zsh
/// (`name='value'` / `name=value`).
pub fn parse_bash_zsh_aliases(output: &str) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for line in output.lines() {
        let line = line.trim().trim_start_matches("alias ").trim_start();
        if let Some(caps) = ALIAS_LINE_RE.captures(line) {
            aliases.insert(caps[1].to_string(), strip_quotes(&caps[2]).to_string());
        }
    }
    aliases
}

/// Parses `alias` output from fish (`alias name 'value'`).
pub fn parse_fish_aliases(output: &str) -> HashMap<String, String> {
    let mut aliases = HashMap::new();
    for line in output.lines() {
        let line = line.trim();
        let line = line.strip_prefix("alias ").unwrap_or(line);
        if let Some((name, value)) = line.split_once(char::is_whitespace) {
            aliases.insert(
                name.to_string(),
                strip_quotes(value.trim_start()).to_string(),
            );
        }
    }
    aliases
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Resolves an alias value to its base executable name.
///
/// Takes the first token of the alias value. Wrapper commands are NOT
/// skipped here: the alias itself is the thing being resolved
/// (`alias suod='sudo'` resolves to `sudo`).
pub fn resolve_alias_to_executable(alias_value: &str) -> Option<String> {
    let first = alias_value.trim().split_whitespace().next()?;
    normalize_executable(first)
}

/// Builds alias → project-id mappings for aliases resolving to known
/// projects.
///
/// Alias chains (alias pointing at another alias) resolve one level deep.
/// Aliases shadowing an already-known executable are left alone.
pub fn build_alias_mappings(
    aliases: &HashMap<String, String>,
    mapper: &ProjectMapper,
) -> HashMap<String, String> {
    let mut alias_to_exe: HashMap<String, String> = HashMap::new();
    for (name, value) in aliases {
        if let Some(exe) = resolve_alias_to_executable(value) {
            alias_to_exe.insert(name.clone(), exe);
        }
    }

    // Resolve one level of alias chains
    let snapshot = alias_to_exe.clone();
    for exe in alias_to_exe.values_mut() {
        if let Some(target) = snapshot.get(exe) {
            if target != exe {
                exe.clone_from(target);
            }
        }
    }

    let mut mappings = HashMap::new();
    for (name, exe) in alias_to_exe {
        if mapper.is_known(&name) {
            continue;
        }
        if let Some(project_id) = mapper.map_executable(&exe) {
            mappings.insert(name, project_id.to_string());
        }
    }
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mapper() -> ProjectMapper {
        let mut mapper = ProjectMapper::new();
        mapper
            .load_str(
                r#"
                [git]
                name = "Git"

                [kubernetes]
                name = "Kubernetes"
                executables = ["kubectl"]
                "#,
            )
            .unwrap();
        mapper
    }

    #[test]
    fn detects_common_shells() {
        assert_eq!(detect_shell_from(Some("/bin/bash")), Shell::Bash);
        assert_eq!(detect_shell_from(Some("/bin/zsh")), Shell::Zsh);
        assert_eq!(detect_shell_from(Some("/usr/bin/fish")), Shell::Fish);
        assert_eq!(detect_shell_from(Some("/opt/homebrew/bin/bash")), Shell::Bash);
        assert_eq!(detect_shell_from(Some("/bin/csh")), Shell::Unknown);
        assert_eq!(detect_shell_from(None), Shell::Unknown);
    }

    #[test]
    fn parses_bash_format() {
        let output = "alias l='ls -CF'\nalias ll='ls -alF'\n";
        let aliases = parse_bash_zsh_aliases(output);
        assert_eq!(aliases["l"], "ls -CF");
        assert_eq!(aliases["ll"], "ls -alF");
    }

    #[test]
    fn parses_zsh_format_without_prefix() {
        let output = "l='ls -CF'\nll='ls -alF'\n";
        let aliases = parse_bash_zsh_aliases(output);
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases["l"], "ls -CF");
    }

    #[test]
    fn parses_double_quotes_and_bare_values() {
        let output = "alias tf=\"terraform\"\nk=kubectl\n";
        let aliases = parse_bash_zsh_aliases(output);
        assert_eq!(aliases["tf"], "terraform");
        assert_eq!(aliases["k"], "kubectl");
    }

    #[test]
    fn parses_fish_format() {
        let output = "alias l 'ls -CF'\nalias gco 'git checkout'\n";
        let aliases = parse_fish_aliases(output);
        assert_eq!(aliases["l"], "ls -CF");
        assert_eq!(aliases["gco"], "git checkout");
    }

    #[test]
    fn resolves_value_to_first_token() {
        assert_eq!(
            resolve_alias_to_executable("git checkout"),
            Some("git".to_string())
        );
        assert_eq!(
            resolve_alias_to_executable("/usr/bin/git status"),
            Some("git".to_string())
        );
        assert_eq!(resolve_alias_to_executable(""), None);
    }

    #[test]
    fn wrappers_are_not_skipped_in_alias_values() {
        // alias suod='sudo' should resolve to sudo itself
        assert_eq!(
            resolve_alias_to_executable("sudo"),
            Some("sudo".to_string())
        );
    }

    #[test]
    fn builds_mappings_for_known_projects_only() {
        let aliases = HashMap::from([
            ("g".to_string(), "git".to_string()),
            ("k".to_string(), "kubectl".to_string()),
            ("weird".to_string(), "no-such-tool".to_string()),
        ]);

        let mappings = build_alias_mappings(&aliases, &test_mapper());

        assert_eq!(mappings["g"], "git");
        assert_eq!(mappings["k"], "kubernetes");
        assert!(!mappings.contains_key("weird"));
    }

    #[test]
    fn alias_chains_resolve_one_level() {
        let aliases = HashMap::from([
            ("g".to_string(), "git".to_string()),
            ("gg".to_string(), "g status".to_string()),
        ]);

        let mappings = build_alias_mappings(&aliases, &test_mapper());

        assert_eq!(mappings["gg"], "git");
    }

    #[test]
    fn known_executables_are_not_shadowed() {
        // An alias named after a known executable keeps its original mapping
        let aliases = HashMap::from([("git".to_string(), "hub".to_string())]);
        let mappings = build_alias_mappings(&aliases, &test_mapper());
        assert!(!mappings.contains_key("git"));
    }
}
