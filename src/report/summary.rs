//! Training summary table

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::ml::Params;
use crate::pipeline::TrainingReport;

/// Render a parameter assignment as `key=value` pairs
pub fn format_params(params: &Params) -> String {
    if params.is_empty() {
        return "defaults".to_string();
    }
    params
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn score_color(score: f64, expected: f64) -> Color {
    if score >= expected {
        Color::Green
    } else {
        Color::Yellow
    }
}

/// Per-family results of one training run
pub struct TrainingSummary<'a> {
    pub report: &'a TrainingReport,
    pub expected_score: f64,
}

impl<'a> TrainingSummary<'a> {
    pub fn new(report: &'a TrainingReport, expected_score: f64) -> Self {
        Self { report, expected_score }
    }

    /// Build the table; the winning row is bold
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(
            ["Model", "Best Params", "CV Acc", "Train F1", "Test F1", "Precision", "Recall"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for (i, model) in self.report.models.iter().enumerate() {
            let winner = i == self.report.best_index;
            let name = if winner {
                format!("🏆 {}", model.family)
            } else {
                model.family.to_string()
            };
            let mut row = vec![
                Cell::new(name),
                Cell::new(format_params(&model.best_params)),
                Cell::new(format!("{:.4}", model.cv_score)),
                Cell::new(format!("{:.4}", model.train_metrics.f1_score)),
                Cell::new(format!("{:.4}", model.test_metrics.f1_score))
                    .fg(score_color(model.test_metrics.f1_score, self.expected_score)),
                Cell::new(format!("{:.4}", model.test_metrics.precision_score)),
                Cell::new(format!("{:.4}", model.test_metrics.recall_score)),
            ];
            if winner {
                row = row.into_iter().map(|c| c.add_attribute(Attribute::Bold)).collect();
            }
            table.add_row(row);
        }
        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("TRAINING SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        // Indent the table
        for line in self.table().to_string().lines() {
            println!("    {}", line);
        }

        if self.report.below_expected || self.report.overfitting {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("QUALITY WARNINGS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            let best = self.report.best();
            if self.report.below_expected {
                println!(
                    "        {} test f1 {:.4} is below the expected {:.2}",
                    style("•").yellow(),
                    best.test_metrics.f1_score,
                    self.expected_score
                );
            }
            if self.report.overfitting {
                println!(
                    "        {} train/test f1 gap {:.4} suggests overfitting",
                    style("•").yellow(),
                    (best.train_metrics.f1_score - best.test_metrics.f1_score).abs()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_params() {
        let mut params = Params::new();
        assert_eq!(format_params(&params), "defaults");
        params.insert("weights".to_string(), json!("distance"));
        params.insert("n_neighbors".to_string(), json!(5));
        assert_eq!(format_params(&params), "n_neighbors=5, weights=distance");
    }
}
