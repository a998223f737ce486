//! Styled terminal output for pipeline runs

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

use crate::config::PipelineSettings;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static CLOUD: Emoji<'_, '_> = Emoji("☁️  ", "");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

const BOX_WIDTH: usize = 60;

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
     ____  _     _     _      ____                     _
    |  _ \| |__ (_)___| |__  / ___|_   _  __ _ _ __ __| |
    | |_) | '_ \| / __| '_ \| |  _| | | |/ _` | '__/ _` |
    |  __/| | | | \__ \ | | | |_| | |_| | (_| | | | (_| |
    |_|   |_| |_|_|___/_| |_|\____|\__,_|\__,_|_|  \__,_|
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        TARGET,
        style("Phishing-URL classifier training pipeline").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

fn card_row(icon: &Emoji<'_, '_>, label: &str, value: &str) {
    println!("    │  {}{:<12}{:<width$}│", icon, label, value, width = BOX_WIDTH - 18);
}

/// Print the resolved settings as a card
pub fn print_config(settings: &PipelineSettings, timestamp: &str) {
    let line = "─".repeat(BOX_WIDTH - 2);
    let value_width = BOX_WIDTH - 20;

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(BOX_WIDTH - 20)
    );
    println!("    ├{}┤", line);
    card_row(&FOLDER, "Store:", &truncate_path(&settings.store_dir, value_width));
    card_row(
        &FOLDER,
        "Collection:",
        &truncate_string(&format!("{}.{}", settings.database, settings.collection), value_width),
    );
    card_row(&TARGET, "Target:", &truncate_string(&settings.target_column, value_width));
    card_row(&SAVE, "Artifacts:", &truncate_path(&settings.artifact_dir.join(timestamp), value_width));
    card_row(&SAVE, "Model dir:", &truncate_path(&settings.model_dir, value_width));
    println!("    ├{}┤", line);
    card_row(&CHART, "Test ratio:", &format!("{:.0}%", settings.test_ratio * 100.0));
    card_row(&CHART, "Drift p:", &format!("{:.3}", settings.drift_threshold));
    card_row(
        &CHART,
        "Split seed:",
        &settings.split_seed.map_or_else(|| "random".to_string(), |s| s.to_string()),
    );
    if let Some(bucket) = &settings.bucket {
        card_row(&CLOUD, "Bucket:", &truncate_string(bucket, value_width));
    }
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print how long a step took
pub fn print_step_time(elapsed: Duration) {
    println!("      {}", style(format!("⏱  {:.2}s", elapsed.as_secs_f64())).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", WARN, style(message).yellow());
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("PhishGuard training complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(detail) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(detail).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

/// Print a labelled path, e.g. an artifact location
pub fn print_path(label: &str, path: &Path) {
    println!("      {} {}", style(label).dim(), path.display());
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

/// Keep the tail of `s`, prefixed with `...` when it is too long
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string_keeps_tail() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("Artifacts/01_02_2026/model.json", 13), "...model.json");
    }
}
