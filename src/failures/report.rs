//! Failure reports, one per cluster, written as markdown files

use super::traceback::format_traces;
use super::{FailureCluster, FailureIndex};
use crate::error::Result;
use crate::utils::sanitize_filename;
use std::path::Path;

const PRE_CHECK_MSG: &str = concat!(
    "\n--- MESSAGE GENERATED BY ",
    env!("CARGO_PKG_NAME"),
    " ---\n",
    "\n",
    "**Pre-filing checks**\n",
    "\n",
    "- [ ] I have searched for open issues that report the same problem\n",
    "- [ ] I have checked that the bug affects the latest version of the extractor\n",
    "\n",
    "**Information**\n",
    "\n",
);

/// A ready-to-file report for one failure cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureReport {
    /// Issue title, also used as file name
    pub title: String,
    /// Markdown body
    pub body: String,
}

/// Build one report per (host, method, kind) cluster in `index`
pub fn build_reports(
    index: &FailureIndex,
    extractor_version: &str,
    project_marker: &str,
) -> Vec<FailureReport> {
    index
        .clusters()
        .iter()
        .map(|cluster| build_report(cluster, extractor_version, project_marker))
        .collect()
}

fn build_report(cluster: &FailureCluster, extractor_version: &str, marker: &str) -> FailureReport {
    let host = cluster.host.strip_prefix("www.").unwrap_or(&cluster.host);
    let site = host.split('.').next().unwrap_or(host);
    let method = cluster.method_name();
    let exception = cluster.kind.display_name();

    let title = format!(
        "{}: {} - {} (found by {})",
        site,
        method,
        exception,
        env!("CARGO_PKG_NAME")
    );

    let triggered_by = match cluster.method {
        Some(field) => format!(".{}()", field.name()),
        None => "parse()".to_string(),
    };

    let mut body = String::from(PRE_CHECK_MSG);
    body.push_str(&format!("- host: `{}`\n", host));
    body.push_str(&format!("- extractor version: `{}`\n", extractor_version));
    body.push_str(&format!("- exception: `{}`\n", exception));
    body.push_str(&format!("- triggered by calling: `{}`\n", triggered_by));
    body.push_str("- triggered on: \n");
    for failure in &cluster.failures {
        body.push_str(&format!("    - {}\n", failure.url));
    }
    body.push('\n');

    body.push_str("**Stack Traces**\n\n");
    if cluster.failures.len() > 1 {
        body.push_str("_'...' indicates frames present in all traces (but only shown in the first)_\n\n");
    }

    let traces = format_traces(&cluster.failures, marker);
    for (failure, lines) in cluster.failures.iter().zip(traces) {
        body.push_str(&format!("URL: {}\n\n", failure.url));
        body.push_str("```\n");
        for line in lines {
            body.push_str(&line);
            body.push('\n');
        }
        body.push_str("```\n\n");
    }

    FailureReport { title, body }
}

/// Write each report to `<dir>/<sanitized title>.md`
///
/// Creates `dir` if needed. Returns the number of reports written.
pub async fn write_reports(reports: &[FailureReport], dir: &Path) -> Result<usize> {
    if reports.is_empty() {
        return Ok(0);
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        tracing::error!(dir = %dir.display(), error = %e, "failed to create report directory");
        e
    })?;

    for report in reports {
        let path = dir.join(format!("{}.md", sanitize_filename(&report.title)));
        tokio::fs::write(&path, &report.body).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to write failure report");
            e
        })?;
    }

    tracing::warn!(
        count = reports.len(),
        dir = %dir.display(),
        "some recipes could not be (completely) extracted, reports were written"
    );
    Ok(reports.len())
}
