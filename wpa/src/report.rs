// wpa/src/report.rs
use std::fmt::Write;

use wpa_common::error::Result;
use wpa_common::model::AnalysisReport;

/// Plain-text report written to stdout.
pub fn render_report(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let sections = [
        ("DIFF", &report.comparison.diff),
        ("EXTRA", &report.comparison.extra),
        ("MISSING", &report.comparison.missing),
        ("PHP FILES IN UPLOADS", &report.comparison.upload_php),
    ];
    for (title, paths) in sections {
        let _ = writeln!(out, "{title}: ({})", paths.len());
        for path in paths {
            let _ = writeln!(out, "{path}");
        }
    }

    let _ = writeln!(out, "UNRESOLVED ARTIFACTS: ({})", report.unresolved.len());
    for artifact in &report.unresolved {
        let _ = writeln!(
            out,
            "{} {} {}: {}",
            artifact.kind,
            artifact.slug,
            artifact.version.as_deref().unwrap_or("?"),
            artifact.reason
        );
    }
    out
}

/// Machine-readable form of the same report, for `--json`.
pub fn render_json(report: &AnalysisReport) -> Result<String> {
    let mut out = serde_json::to_string_pretty(report)?;
    out.push('\n');
    Ok(out)
}
