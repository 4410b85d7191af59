use std::io::IsTerminal;
use chrono::{DateTime, Duration, Utc};
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::batch::{BatchResult, SkippedProject};
use crate::discrepancy::{AnalysisResult, Discrepancy, Severity};
use crate::history::HistoryRecord;
use crate::ingest::RejectedRecord;
use crate::scoring::{FactorKey, PriorityResult, TierTable};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate_title(title: &str, max_width: usize) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= max_width {
        title.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Parse "#RRGGBB" into RGB components.
fn hex_to_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Tier name painted in the tier's own color.
fn tier_badge(name: &str, color: &str, use_colors: bool) -> String {
    match hex_to_rgb(color) {
        Some((r, g, b)) if use_colors => name.truecolor(r, g, b).bold().to_string(),
        _ => name.to_string(),
    }
}

fn severity_badge(severity: Severity, use_colors: bool) -> String {
    let label = format!("{:<6}", severity.as_str().to_uppercase());
    if !use_colors {
        return label;
    }
    match severity {
        Severity::High => label.red().bold().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.green().to_string(),
    }
}

/// Format a single-project score with its per-factor breakdown
pub fn format_priority_detail(result: &PriorityResult, use_colors: bool) -> String {
    let mut lines = vec![format!(
        "Score: {}  Tier: {} ({})",
        if use_colors {
            result.score.bold().to_string()
        } else {
            result.score.to_string()
        },
        tier_badge(&result.tier, &result.tier_color, use_colors),
        result.tier_color
    )];

    for key in FactorKey::ALL {
        if let Some(entry) = result.breakdown.get(&key) {
            lines.push(format!(
                "  {:<24}{:>6.1} x {:.2} -> {:>3}",
                key.label(),
                entry.value,
                entry.weight,
                entry.contribution
            ));
        }
    }

    lines.push(format!("  {}", result.recommendation));
    lines.join("\n")
}

/// Format a ranked batch: index, score, tier, name, area
pub fn format_ranked_table(batch: &BatchResult, use_colors: bool) -> String {
    if batch.results.is_empty() {
        return "No projects scored.".to_string();
    }

    let term_width = get_terminal_width();
    let tier_width = batch
        .results
        .iter()
        .map(|r| r.priority.tier.chars().count())
        .max()
        .unwrap_or(0);
    let separator = "  ";

    batch
        .results
        .iter()
        .enumerate()
        .map(|(idx, project)| {
            let index_str = format!("{:>3}.", idx + 1);
            let score_str = format!("{:>3}", project.score());
            let tier_padding = " ".repeat(tier_width - project.priority.tier.chars().count());
            let tier = format!(
                "{}{}",
                tier_badge(&project.priority.tier, &project.priority.tier_color, use_colors),
                tier_padding
            );

            let fixed_width = index_str.len()
                + 1
                + score_str.len()
                + tier_width
                + separator.len() * 3
                + project.area.chars().count();
            let name = match term_width {
                Some(width) if width > fixed_width + 10 => {
                    truncate_title(&project.name, width - fixed_width)
                }
                Some(_) => truncate_title(&project.name, 20),
                None => project.name.clone(),
            };

            if use_colors {
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str.dimmed(),
                    score_str.bold(),
                    separator,
                    tier,
                    separator,
                    name,
                    separator,
                    project.area.cyan()
                )
            } else {
                format!(
                    "{} {}{}{}{}{}{}{}",
                    index_str, score_str, separator, tier, separator, name, separator, project.area
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a ranked batch as tab-separated values for scripting
/// Columns: score, tier, id, name, area, sponsor (no headers, no colors)
pub fn format_ranked_tsv(batch: &BatchResult) -> String {
    batch
        .results
        .iter()
        .map(|p| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                p.score(),
                p.priority.tier,
                p.id,
                p.name,
                p.area,
                p.sponsor
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_skipped(skipped: &[SkippedProject]) -> String {
    skipped
        .iter()
        .map(|s| {
            format!(
                "skipped #{} ({}): {}",
                s.index + 1,
                s.id.as_deref().unwrap_or("no id"),
                s.error.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_rejected(rejected: &[RejectedRecord]) -> String {
    rejected
        .iter()
        .map(|r| format!("rejected record {}: {}", r.index, r.error.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_discrepancy(d: &Discrepancy, use_colors: bool) -> String {
    let mut out = format!(
        "{} [{}] {}",
        severity_badge(d.severity, use_colors),
        d.kind,
        d.description
    );
    if d.source_value_a.is_some() || d.source_value_b.is_some() {
        out.push_str(&format!(
            "\n         spreadsheet: {}  deck: {}",
            d.source_value_a.as_deref().unwrap_or("-"),
            d.source_value_b.as_deref().unwrap_or("-")
        ));
    }
    if let Some(rec) = &d.recommendation {
        out.push_str(&format!("\n         -> {}", rec));
    }
    out
}

/// Format a cross-check result, most severe discrepancies first
pub fn format_analysis(result: &AnalysisResult, use_colors: bool) -> String {
    let counts = result.severity_counts();
    let files = [&result.source_a_info.filename, &result.source_b_info.filename]
        .iter()
        .filter_map(|f| f.as_deref())
        .collect::<Vec<_>>()
        .join(" vs ");

    let mut lines = Vec::new();
    if !files.is_empty() {
        lines.push(files);
    }
    lines.push(format!(
        "Match score: {}  ({} high, {} medium, {} low)",
        if use_colors {
            result.match_score.bold().to_string()
        } else {
            result.match_score.to_string()
        },
        counts.high,
        counts.medium,
        counts.low
    ));
    lines.push(result.summary.clone());

    if result.discrepancies.is_empty() {
        lines.push("No discrepancies found.".to_string());
    } else {
        lines.push(String::new());
        lines.extend(
            result
                .by_severity()
                .into_iter()
                .map(|d| format_discrepancy(d, use_colors)),
        );
    }
    lines.join("\n")
}

/// Format history records, one per line: kind, id, age, status, files
pub fn format_history(records: &[HistoryRecord], now: DateTime<Utc>, use_colors: bool) -> String {
    if records.is_empty() {
        return "No history records found.".to_string();
    }

    records
        .iter()
        .map(|r| {
            let age = format_age(now - r.analysis_date);
            let detail = match (r.total_projects, &r.summary) {
                (Some(n), _) => format!("{} projects", n),
                (None, Some(summary)) => truncate_title(summary, 60),
                (None, None) => String::new(),
            };
            let kind = format!("{:<11}", r.kind.label());
            let id = format!("#{:<5}", r.id);
            let line = if use_colors {
                format!(
                    "{} {} {:>4}  {:<9}  {}  {}",
                    kind.cyan(),
                    id.bold(),
                    age,
                    r.status.as_str(),
                    r.filenames.join(", "),
                    detail.dimmed()
                )
            } else {
                format!(
                    "{} {} {:>4}  {:<9}  {}  {}",
                    kind,
                    id,
                    age,
                    r.status.as_str(),
                    r.filenames.join(", "),
                    detail
                )
            };
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the tier table with the score range each tier covers
pub fn format_tiers(tiers: &TierTable, use_colors: bool) -> String {
    let name_width = tiers
        .tiers()
        .iter()
        .map(|t| t.name.chars().count())
        .max()
        .unwrap_or(0);

    tiers
        .tiers()
        .iter()
        .enumerate()
        .map(|(idx, tier)| {
            let range = tiers
                .range_of(idx)
                .map(|r| format!("{:>3}-{:<3}", r.start(), r.end()))
                .unwrap_or_default();
            let padding = " ".repeat(name_width - tier.name.chars().count());
            format!(
                "{}{}  {}  {}  {}",
                tier_badge(&tier.name, &tier.color, use_colors),
                padding,
                range,
                tier.color,
                tier.recommendation
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a duration into a human-readable age string
/// "2h" for hours, "3d" for days, "1w" for weeks
pub fn format_age(duration: Duration) -> String {
    let hours = duration.num_hours();
    let days = duration.num_days();
    let weeks = days / 7;

    if weeks >= 1 {
        format!("{}w", weeks)
    } else if days >= 1 {
        format!("{}d", days)
    } else if hours >= 1 {
        format!("{}h", hours)
    } else {
        let minutes = duration.num_minutes();
        if minutes >= 1 {
            format!("{}m", minutes)
        } else {
            "now".to_string()
        }
    }
}
