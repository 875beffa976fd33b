//! Executable → open-source-project mapping table.
//!
//! The table is a TOML document keyed by project id; a curated copy ships
//! compiled into the binary and user tables/overrides merge on top.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Curated project table, compiled in.
const BUNDLED_PROJECTS: &str = include_str!("../data/projects.toml");

/// Errors loading a project table.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Reading the table file failed.
    #[error("failed to read project table {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The table was not valid TOML.
    #[error("invalid project table: {0}")]
    Parse(#[from] Box<toml::de::Error>),
}

/// A donation URL for a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DonationUrl {
    /// Platform hint (`opencollective`, `github_sponsors`, `direct`, ...).
    #[serde(default = "default_platform")]
    pub platform: String,
    pub url: String,
}

fn default_platform() -> String {
    "direct".to_string()
}

/// An open source project that can receive donations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Canonical (lowercase) executable names this project owns.
    pub executables: Vec<String>,
    pub donation_urls: Vec<DonationUrl>,
    pub github: Option<String>,
    pub website: Option<String>,
}

impl Project {
    /// The first listed donation URL, if any.
    pub fn primary_donation_url(&self) -> Option<&str> {
        self.donation_urls.first().map(|u| u.url.as_str())
    }
}

/// On-disk shape of one `[project-id]` table entry.
#[derive(Debug, Deserialize)]
struct ProjectEntry {
    name: Option<String>,
    #[serde(default)]
    description: String,
    executables: Option<Vec<String>>,
    #[serde(default)]
    donation_urls: Vec<DonationUrl>,
    github: Option<String>,
    website: Option<String>,
}

/// Maps executables to projects.
#[derive(Debug, Default)]
pub struct ProjectMapper {
    projects: HashMap<String, Project>,
    exe_to_project: HashMap<String, String>,
}

impl ProjectMapper {
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapper with the bundled table loaded.
    pub fn bundled() -> Result<Self, MapperError> {
        let mut mapper = Self::new();
        mapper.load_str(BUNDLED_PROJECTS)?;
        Ok(mapper)
    }

    /// Loads project entries from a TOML string, merging over existing ones.
    pub fn load_str(&mut self, content: &str) -> Result<(), MapperError> {
        let entries: HashMap<String, ProjectEntry> =
            toml::from_str(content).map_err(Box::new)?;

        for (id, entry) in entries {
            let project = Project {
                name: entry.name.unwrap_or_else(|| id.clone()),
                description: entry.description,
                executables: entry.executables.unwrap_or_else(|| vec![id.clone()]),
                donation_urls: entry.donation_urls,
                github: entry.github,
                website: entry.website,
                id: id.clone(),
            };

            for exe in &project.executables {
                self.exe_to_project.insert(exe.clone(), id.clone());
            }
            self.projects.insert(id, project);
        }

        Ok(())
    }

    /// Loads project entries from a TOML file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), MapperError> {
        let content = std::fs::read_to_string(path).map_err(|source| MapperError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_str(&content)
    }

    /// Looks up a project by id.
    pub fn get_project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Looks up the project that owns an executable.
    pub fn project_for_executable(&self, exe: &str) -> Option<&Project> {
        self.exe_to_project
            .get(exe)
            .and_then(|id| self.projects.get(id))
    }

    /// Maps an executable to its project id.
    pub fn map_executable(&self, exe: &str) -> Option<&str> {
        self.exe_to_project.get(exe).map(String::as_str)
    }

    /// Adds a user-supplied executable → project override.
    pub fn add_custom_mapping(&mut self, exe: &str, project_id: &str) {
        self.exe_to_project
            .insert(exe.to_string(), project_id.to_string());
    }

    /// Whether an executable has any mapping.
    pub fn is_known(&self, exe: &str) -> bool {
        self.exe_to_project.contains_key(exe)
    }

    /// All loaded projects, ordered by id.
    pub fn all_projects(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.values().collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        projects
    }

    /// Case-insensitive search over name, description, id and executables.
    pub fn search(&self, query: &str) -> Vec<&Project> {
        let query = query.to_lowercase();
        let mut matches: Vec<&Project> = self
            .projects
            .values()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.description.to_lowercase().contains(&query)
                    || p.id.to_lowercase().contains(&query)
                    || p.executables.iter().any(|e| e.contains(&query))
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Number of loaded projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether any project is loaded.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
