//! Unknowns command: investigate and classify unmapped executables.
//!
//! Investigation looks the executable up on `PATH`, sniffs whether it is a
//! script or a binary, scans script headers for copyright lines and suggests
//! a classification. The user can then record the final word with
//! `fund unknowns classify`.

use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;

use fund_db::{LocalDb, UnknownRecord};

use crate::cli::UnknownsAction;
use crate::config::Config;

/// Patterns that indicate copyright/authorship in script headers.
static COPYRIGHT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\(c\)\s*\d{4}",
        r"(?i)copyright\s+\d{4}",
        r"(?i)copyright\s+\(c\)",
        r"(?i)author:\s*\S+",
        r"(?i)license:\s*\S+",
        r"(?i)mit license",
        r"(?i)apache license",
        r"(?i)gnu general public license",
        r"(?i)\bgpl\b",
        r"(?i)all rights reserved",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Directories that indicate system-provided commands.
const SYSTEM_DIRS: &[&str] = &["/usr/bin/", "/bin/", "/usr/sbin/", "/sbin/", "/System/"];

/// Package-manager path fragments; tools here are third-party installs.
const PACKAGE_MANAGER_DIRS: &[&str] = &[
    "/homebrew/",
    "/.nvm/",
    "/.npm/",
    "/.yarn/",
    "/miniconda/",
    "/anaconda/",
    "/.local/share/",
    "/.cargo/",
];

/// macOS built-ins that live outside the usual system dirs.
const MACOS_BUILTINS: &[&str] = &[
    "open",
    "pbcopy",
    "pbpaste",
    "say",
    "osascript",
    "defaults",
    "launchctl",
    "diskutil",
    "plutil",
    "security",
    "codesign",
    "xattr",
    "mdfind",
    "screencapture",
    "sips",
    "pmset",
];

/// Result of investigating an executable.
#[derive(Debug, Clone)]
pub struct Investigation {
    pub executable: String,
    pub path: Option<PathBuf>,
    /// 'script', 'binary', 'not_found' or 'unknown'.
    pub file_type: &'static str,
    pub copyright_line: Option<String>,
    /// Suggested classification.
    pub classification: &'static str,
    pub reason: String,
}

/// Finds an executable on `PATH`.
fn find_in_path(exe: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(exe))
        .find(|candidate| is_executable_file(candidate))
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file())
}

/// Sniffs whether a file is a script or a compiled binary.
fn detect_file_type(path: &Path) -> &'static str {
    let Ok(mut file) = fs::File::open(path) else {
        return "unknown";
    };
    let mut magic = [0u8; 4];
    let Ok(read) = file.read(&mut magic) else {
        return "unknown";
    };
    let magic = &magic[..read];

    if magic.starts_with(b"#!") {
        "script"
    } else if magic.starts_with(&[0x7f, 0x45, 0x4c, 0x46]) // ELF
        || magic.starts_with(&[0xcf, 0xfa, 0xed, 0xfe]) // Mach-O 64
        || magic.starts_with(&[0xca, 0xfe, 0xba, 0xbe]) // Mach-O universal
    {
        "binary"
    } else if std::str::from_utf8(magic).is_ok() {
        // Textual start without a shebang - most likely a script anyway
        "script"
    } else {
        "unknown"
    }
}

/// Scans the first lines of a script for a copyright/authorship line.
fn extract_copyright(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    let reader = BufReader::new(file);

    for line in reader.lines().map_while(Result::ok).take(50) {
        if COPYRIGHT_PATTERNS.iter().any(|p| p.is_match(&line)) {
            return Some(line.trim().chars().take(200).collect());
        }
    }
    None
}

fn is_system_path(path: &str) -> bool {
    SYSTEM_DIRS.iter().any(|dir| path.starts_with(dir))
}

fn in_package_manager_dir(path: &str) -> bool {
    let lower = path.to_lowercase();
    PACKAGE_MANAGER_DIRS.iter().any(|dir| lower.contains(dir))
}

fn is_user_directory(path: &str) -> bool {
    let Some(home) = dirs::home_dir() else {
        return false;
    };
    path.starts_with(&*home.to_string_lossy()) && !in_package_manager_dir(path)
}

fn truncated(line: &str) -> String {
    line.chars().take(50).collect()
}

/// Suggests a classification for an executable.
fn suggest_classification(
    exe: &str,
    path: Option<&str>,
    copyright: Option<&str>,
) -> (&'static str, String) {
    let Some(path) = path else {
        return ("not_found", "executable not found in PATH".to_string());
    };

    if MACOS_BUILTINS.contains(&exe) {
        return ("system", "macOS built-in command".to_string());
    }

    if is_system_path(path) {
        return copyright.map_or_else(
            || ("system", format!("system path: {path}")),
            |line| (
                "third_party",
                format!("system path with copyright: {}", truncated(line)),
            ),
        );
    }

    if is_user_directory(path) && copyright.is_none() {
        return ("user", "user directory, no copyright detected".to_string());
    }

    if let Some(line) = copyright {
        return ("third_party", format!("copyright found: {}", truncated(line)));
    }

    if in_package_manager_dir(path) {
        return ("third_party", "installed via package manager".to_string());
    }

    ("unknown", "unable to determine classification".to_string())
}

/// Fully investigates an executable.
pub fn investigate(exe: &str) -> Investigation {
    let path = find_in_path(exe);

    let Some(path) = path else {
        return Investigation {
            executable: exe.to_string(),
            path: None,
            file_type: "not_found",
            copyright_line: None,
            classification: "not_found",
            reason: "executable not found in PATH".to_string(),
        };
    };

    let file_type = detect_file_type(&path);
    let copyright_line = if file_type == "script" {
        extract_copyright(&path)
    } else {
        None
    };

    let path_str = path.display().to_string();
    let (classification, reason) =
        suggest_classification(exe, Some(&path_str), copyright_line.as_deref());

    Investigation {
        executable: exe.to_string(),
        path: Some(path),
        file_type,
        copyright_line,
        classification,
        reason,
    }
}

fn record_from(investigation: &Investigation) -> UnknownRecord {
    UnknownRecord {
        executable: investigation.executable.clone(),
        path: investigation.path.as_ref().map(|p| p.display().to_string()),
        file_type: Some(investigation.file_type.to_string()),
        classification: Some(investigation.classification.to_string()),
        copyright_found: investigation.copyright_line.clone(),
        ..Default::default()
    }
}

/// Formats an investigation result for display.
pub fn format_investigation(investigation: &Investigation) -> String {
    let mut output = String::new();

    writeln!(output, "Executable:     {}", investigation.executable).unwrap();
    writeln!(
        output,
        "Path:           {}",
        investigation
            .path
            .as_ref()
            .map_or_else(|| "(not found)".to_string(), |p| p.display().to_string())
    )
    .unwrap();
    writeln!(output, "Type:           {}", investigation.file_type).unwrap();
    if let Some(line) = &investigation.copyright_line {
        writeln!(output, "Copyright:      {line}").unwrap();
    }
    writeln!(output, "Classification: {}", investigation.classification).unwrap();
    writeln!(output, "Reason:         {}", investigation.reason).unwrap();

    output
}

/// Formats the recorded unknowns listing.
pub fn format_list(records: &[UnknownRecord]) -> String {
    let mut output = String::new();

    if records.is_empty() {
        writeln!(output, "No unknown executables recorded.").unwrap();
        writeln!(
            output,
            "Run 'fund unknowns investigate <exe>' after 'fund analyze'."
        )
        .unwrap();
        return output;
    }

    writeln!(output, "RECORDED UNKNOWNS ({} total)", records.len()).unwrap();
    writeln!(output).unwrap();

    for record in records {
        writeln!(
            output,
            "{:<20} {:<12} {}",
            record.executable,
            record.classification.as_deref().unwrap_or("-"),
            record.path.as_deref().unwrap_or("-"),
        )
        .unwrap();
    }

    output
}

fn normalize_classification(raw: &str) -> Result<&'static str> {
    match raw {
        "system" => Ok("system"),
        "third-party" | "third_party" => Ok("third_party"),
        "user" => Ok("user"),
        "ignored" => Ok("ignored"),
        other => bail!(
            "invalid classification: {other} (expected system, third-party, user or ignored)"
        ),
    }
}

/// Runs the unknowns command.
pub fn run(config: &Config, action: &UnknownsAction) -> Result<()> {
    let db = LocalDb::open(&config.database.unknowns_path).with_context(|| {
        format!(
            "failed to open unknowns database at {}",
            config.database.unknowns_path.display()
        )
    })?;

    match action {
        UnknownsAction::List => {
            let records = db.list_unknowns()?;
            print!("{}", format_list(&records));
        }
        UnknownsAction::Investigate { executable, force } => {
            if !force {
                if let Some(cached) = db.get_unknown(executable)? {
                    if cached.path.is_some() {
                        println!("{executable} already investigated (use --force to redo):");
                        println!(
                            "  classification: {}",
                            cached.classification.as_deref().unwrap_or("-")
                        );
                        return Ok(());
                    }
                }
            }

            let investigation = investigate(executable);
            db.upsert_unknown(&record_from(&investigation), Utc::now())?;
            print!("{}", format_investigation(&investigation));
        }
        UnknownsAction::Classify {
            executable,
            classification,
            project,
            notes,
        } => {
            let classification = normalize_classification(classification)?;

            let mut record = match db.get_unknown(executable)? {
                Some(record) => record,
                None => record_from(&investigate(executable)),
            };
            record.classification = Some(classification.to_string());
            if project.is_some() {
                record.suggested_project.clone_from(project);
            }
            if notes.is_some() {
                record.user_notes.clone_from(notes);
            }
            db.upsert_unknown(&record, Utc::now())?;

            // Settled classifications go on the exception list so the
            // executable stops showing up as actionable.
            if matches!(classification, "user" | "system" | "ignored") {
                db.add_exception(executable, classification, Utc::now())?;
            }

            println!("Classified {executable} as {classification}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn detects_shebang_scripts() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tool");
        fs::write(&path, "#!/bin/sh\necho hello\n").unwrap();

        assert_eq!(detect_file_type(&path), "script");
    }

    #[test]
    fn detects_elf_binaries() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tool");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01]).unwrap();

        assert_eq!(detect_file_type(&path), "binary");
    }

    #[test]
    fn finds_copyright_in_script_header() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tool");
        fs::write(
            &path,
            "#!/usr/bin/env python3\n# Copyright (c) 2019 Example Corp\nprint('hi')\n",
        )
        .unwrap();

        let line = extract_copyright(&path).unwrap();
        assert!(line.contains("Copyright (c) 2019"));
    }

    #[test]
    fn no_copyright_past_scan_window() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tool");
        let mut content = String::from("#!/bin/sh\n");
        for _ in 0..60 {
            content.push_str("true\n");
        }
        content.push_str("# Copyright 2020 too late\n");
        fs::write(&path, content).unwrap();

        assert!(extract_copyright(&path).is_none());
    }

    #[test]
    fn system_path_without_copyright_is_system() {
        let (class, reason) = suggest_classification("ls", Some("/usr/bin/ls"), None);
        assert_eq!(class, "system");
        assert!(reason.contains("/usr/bin/ls"));
    }

    #[test]
    fn copyright_means_third_party() {
        let (class, _) = suggest_classification(
            "sometool",
            Some("/opt/vendor/sometool"),
            Some("Copyright 2020 Vendor Inc"),
        );
        assert_eq!(class, "third_party");
    }

    #[test]
    fn home_script_without_copyright_is_user() {
        let home = dirs::home_dir().unwrap();
        let path = home.join("bin/myscript").display().to_string();
        let (class, _) = suggest_classification("myscript", Some(&path), None);
        assert_eq!(class, "user");
    }

    #[test]
    fn cargo_install_is_third_party() {
        let home = dirs::home_dir().unwrap();
        let path = home.join(".cargo/bin/sometool").display().to_string();
        let (class, reason) = suggest_classification("sometool", Some(&path), None);
        assert_eq!(class, "third_party");
        assert!(reason.contains("package manager"));
    }

    #[test]
    fn missing_executable_is_not_found() {
        let (class, _) = suggest_classification("ghost", None, None);
        assert_eq!(class, "not_found");
    }

    #[test]
    fn classification_spellings() {
        assert_eq!(normalize_classification("third-party").unwrap(), "third_party");
        assert_eq!(normalize_classification("third_party").unwrap(), "third_party");
        assert_eq!(normalize_classification("user").unwrap(), "user");
        assert!(normalize_classification("vendor").is_err());
    }

    #[test]
    fn list_formats_empty_and_populated() {
        assert!(format_list(&[]).contains("No unknown executables recorded."));

        let records = vec![UnknownRecord {
            executable: "mytool".to_string(),
            classification: Some("user".to_string()),
            path: Some("/home/user/bin/mytool".to_string()),
            ..Default::default()
        }];
        let output = format_list(&records);
        assert!(output.contains("RECORDED UNKNOWNS (1 total)"));
        assert!(output.contains("mytool"));
    }
}
