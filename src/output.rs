//! Output formatting and styling module.
//!
//! Provides a centralized interface for operator-facing console output:
//! colored status lines, the timestamped move line and the sweep summary table.
//! Diagnostics that are not meant for the operator go through `tracing`.

use colored::*;
use std::collections::HashMap;
use std::path::Path;

/// Timestamp format used on move lines.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H-%M-%S";

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use organizer::output::OutputFormatter;
    /// OutputFormatter::success("Sweep complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// ```no_run
    /// use organizer::output::OutputFormatter;
    /// OutputFormatter::info("Watching directory /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints the line announcing a relocation: `<timestamp> <source> -> <destination>`.
    pub fn relocation(source: &Path, destination: &Path, dry_run: bool) {
        let line = Self::relocation_line(source, destination);
        if dry_run {
            Self::dry_run_notice(&line);
        } else {
            println!("{}", line);
        }
    }

    /// Formats a relocation line stamped with the current local time.
    pub fn relocation_line(source: &Path, destination: &Path) -> String {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        format!(
            "{} {} -> {}",
            timestamp,
            source.display(),
            destination.display()
        )
    }

    /// Prints a summary table with moved file counts by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use organizer::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("pdf".to_string(), 15);
    /// counts.insert("images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        // Sort categories for consistent output
        let mut categories: Vec<_> = category_counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let max_category_len = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &categories {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural_files(**count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural_files(total_files),
            width = max_category_len
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural_files(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
