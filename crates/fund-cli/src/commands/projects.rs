//! Projects command: search or list the mapping table.

use std::fmt::Write;

use anyhow::Result;

use fund_core::{Project, ProjectMapper};

/// Formats detailed search results.
pub fn format_search_results(results: &[&Project]) -> String {
    let mut output = String::new();

    for project in results {
        writeln!(output, "{} ({})", project.name, project.id).unwrap();
        if !project.description.is_empty() {
            writeln!(output, "  {}", project.description).unwrap();
        }
        writeln!(output, "  Executables: {}", project.executables.join(", ")).unwrap();
        if let Some(url) = project.primary_donation_url() {
            writeln!(output, "  Donate:      {url}").unwrap();
        }
        writeln!(output).unwrap();
    }

    output
}

/// Formats the full project listing.
pub fn format_all(projects: &[&Project]) -> String {
    let mut output = String::new();

    writeln!(output, "KNOWN PROJECTS ({} total)", projects.len()).unwrap();
    writeln!(output).unwrap();

    for project in projects {
        let mut exes = project.executables.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if project.executables.len() > 3 {
            write!(exes, " (+{})", project.executables.len() - 3).unwrap();
        }
        writeln!(output, "{:<16} {:<20} {}", project.id, project.name, exes).unwrap();
    }

    output
}

/// Runs the projects command.
pub fn run(mapper: &ProjectMapper, query: Option<&str>, list_all: bool) -> Result<()> {
    if let Some(query) = query {
        let results = mapper.search(query);
        if results.is_empty() {
            println!("No projects found matching '{query}'");
            return Ok(());
        }
        print!("{}", format_search_results(&results));
    } else if list_all {
        print!("{}", format_all(&mapper.all_projects()));
    } else {
        println!("Usage: fund projects <SEARCH> or fund projects --all");
        println!();
        println!("Examples:");
        println!("  fund projects curl     # Search for 'curl'");
        println!("  fund projects --all    # List all projects");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> ProjectMapper {
        let mut mapper = ProjectMapper::new();
        mapper
            .load_str(
                r#"
                [git]
                name = "Git"
                description = "Distributed version control"
                executables = ["git", "gitk", "git-lfs", "scalar"]

                [[git.donation_urls]]
                url = "https://sfconservancy.org/donate/"
                "#,
            )
            .unwrap();
        mapper
    }

    #[test]
    fn search_results_include_details() {
        let mapper = mapper();
        let results = mapper.search("git");
        let output = format_search_results(&results);

        assert!(output.contains("Git (git)"));
        assert!(output.contains("Distributed version control"));
        assert!(output.contains("https://sfconservancy.org/donate/"));
    }

    #[test]
    fn listing_truncates_long_executable_lists() {
        let mapper = mapper();
        let output = format_all(&mapper.all_projects());

        assert!(output.contains("KNOWN PROJECTS (1 total)"));
        assert!(output.contains("(+1)"));
    }
}
