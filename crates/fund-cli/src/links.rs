//! Donation link generation.
//!
//! Donation platforms do not support programmatic one-time donations, so
//! recommendations turn into pre-filled URLs the user opens to complete the
//! donation manually. Open Collective supports amount pre-fill; GitHub
//! Sponsors does not.

use fund_core::{DistributionResult, Project, ProjectMapper, Recommendation, format_cents};

/// A generated donation link with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationLink {
    /// Comma-joined names of the projects behind this link.
    pub project_names: String,
    pub platform: String,
    pub url: String,
    pub amount_cents: i64,
    /// Whether the amount is pre-filled in the URL.
    pub prefilled: bool,
}

/// Recommendations merged by shared donation URL.
#[derive(Debug, Clone)]
pub struct AggregatedRecommendation<'a> {
    /// The shared primary donation URL ("" when the projects have none).
    pub url: String,
    pub projects: Vec<&'a Project>,
    pub amount_cents: i64,
    pub percentage: f64,
}

/// Donation platforms we can generate pre-filled links for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    OpenCollective,
    GithubSponsors,
    Direct,
}

/// Groups recommendations by primary donation URL, summing amounts.
///
/// Projects sharing one donation URL (e.g. GNU projects all pointing at the
/// FSF) merge into a single entry. Projects without a URL each get their own
/// entry with `url` empty. Output is ordered by amount descending.
pub fn aggregate_by_donation_url<'a>(
    recommendations: &[Recommendation],
    mapper: &'a ProjectMapper,
) -> Vec<AggregatedRecommendation<'a>> {
    let mut groups: Vec<AggregatedRecommendation<'a>> = Vec::new();

    for rec in recommendations {
        let Some(project) = mapper.get_project(&rec.project_id) else {
            tracing::warn!(project_id = %rec.project_id, "recommendation for unmapped project");
            continue;
        };
        let url = project.primary_donation_url().unwrap_or("").to_string();

        // URL-less projects never merge with each other
        let existing = if url.is_empty() {
            None
        } else {
            groups.iter().position(|g| g.url == url)
        };

        if let Some(idx) = existing {
            let group = &mut groups[idx];
            group.projects.push(project);
            group.amount_cents += rec.amount_cents;
            group.percentage += rec.percentage;
        } else {
            groups.push(AggregatedRecommendation {
                url,
                projects: vec![project],
                amount_cents: rec.amount_cents,
                percentage: rec.percentage,
            });
        }
    }

    groups.sort_by(|a, b| {
        b.amount_cents
            .cmp(&a.amount_cents)
            .then_with(|| a.projects[0].id.cmp(&b.projects[0].id))
    });
    groups
}

/// Detects the platform and its identifier from a donation URL.
fn platform_info(url: &str) -> (Platform, String) {
    if url.contains("opencollective.com") {
        // https://opencollective.com/curl[/donate] -> "curl"
        let mut parts = url.trim_end_matches('/').rsplit('/');
        let mut slug = parts.next().unwrap_or("");
        if slug == "donate" {
            slug = parts.next().unwrap_or("");
        }
        (Platform::OpenCollective, slug.to_string())
    } else if url.contains("github.com/sponsors") {
        // https://github.com/sponsors/bagder -> "bagder"
        let user = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        (Platform::GithubSponsors, user.to_string())
    } else {
        (Platform::Direct, url.to_string())
    }
}

/// Pre-filled Open Collective donation URL.
fn opencollective_url(slug: &str, amount_cents: i64) -> String {
    format!(
        "https://opencollective.com/{slug}/donate?amount={}&interval=one-time",
        format_cents(amount_cents)
    )
}

/// GitHub Sponsors URL. Amounts cannot be pre-filled for one-time donations.
fn github_sponsors_url(user: &str) -> String {
    format!("https://github.com/sponsors/{user}")
}

/// Generates donation links for a distribution, aggregated by shared URL.
///
/// Projects without any donation URL are skipped.
pub fn generate_links(result: &DistributionResult, mapper: &ProjectMapper) -> Vec<DonationLink> {
    let aggregated = aggregate_by_donation_url(&result.recommendations, mapper);
    let mut links = Vec::new();

    for agg in aggregated {
        if agg.url.is_empty() {
            continue;
        }

        let names = agg
            .projects
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let (platform, identifier) = platform_info(&agg.url);
        let link = match platform {
            Platform::OpenCollective => DonationLink {
                project_names: names,
                platform: "Open Collective".to_string(),
                url: opencollective_url(&identifier, agg.amount_cents),
                amount_cents: agg.amount_cents,
                prefilled: true,
            },
            Platform::GithubSponsors => DonationLink {
                project_names: names,
                platform: "GitHub Sponsors".to_string(),
                url: github_sponsors_url(&identifier),
                amount_cents: agg.amount_cents,
                prefilled: false,
            },
            Platform::Direct => DonationLink {
                project_names: names,
                platform: "Direct".to_string(),
                url: agg.url.clone(),
                amount_cents: agg.amount_cents,
                prefilled: false,
            },
        };
        links.push(link);
    }

    links
}

/// Renders a markdown report with donation links.
pub fn markdown_report(result: &DistributionResult, mapper: &ProjectMapper) -> String {
    let mut lines = vec![
        "# Donation Recommendations".to_string(),
        String::new(),
        format!("**Total: ${}**", format_cents(result.budget_cents)),
        String::new(),
        "| Project | Amount | Platform | Link |".to_string(),
        "|---------|--------|----------|------|".to_string(),
    ];

    for link in generate_links(result, mapper) {
        let prefill_note = if link.prefilled { " (pre-filled)" } else { "" };
        lines.push(format!(
            "| {} | ${} | {}{} | [Donate]({}) |",
            link.project_names,
            format_cents(link.amount_cents),
            link.platform,
            prefill_note,
            link.url,
        ));
    }

    lines.push(String::new());
    lines.push("*Generated by fund*".to_string());

    lines.join("\n")
}

/// Renders an HTML report with clickable donation links.
pub fn html_report(result: &DistributionResult, mapper: &ProjectMapper) -> String {
    let rows: String = generate_links(result, mapper)
        .iter()
        .map(|link| {
            let prefill = if link.prefilled { " ✓" } else { "" };
            format!(
                "        <tr>\n            <td>{}</td>\n            <td>${}</td>\n            <td>{}{}</td>\n            <td><a href=\"{}\" target=\"_blank\">Donate</a></td>\n        </tr>\n",
                link.project_names,
                format_cents(link.amount_cents),
                link.platform,
                prefill,
                link.url,
            )
        })
        .collect();

    let total = format_cents(result.budget_cents);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Donation Recommendations</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; }}
        table {{ width: 100%; border-collapse: collapse; margin: 1rem 0; }}
        th, td {{ padding: 0.75rem; text-align: left; border-bottom: 1px solid #ddd; }}
        th {{ background: #f5f5f5; }}
        .total {{ font-size: 1.25rem; font-weight: bold; margin: 1rem 0; }}
        .note {{ color: #666; font-size: 0.9rem; }}
    </style>
</head>
<body>
    <h1>Donation Recommendations</h1>
    <p class="total">Total: ${total}</p>
    <table>
        <thead>
            <tr><th>Project</th><th>Amount</th><th>Platform</th><th>Action</th></tr>
        </thead>
        <tbody>
{rows}        </tbody>
    </table>
    <p class="note">✓ = amount pre-filled in donation form</p>
</body>
</html>
"#
    )
}
