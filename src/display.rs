use crate::extract::Extracteds;
use crate::fingerprint::{Distances, FingerprintSet, SimilarityThreshold};
use colored::*;
use serde::Serialize;

/// Everything the driver reports for one scanned response
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub source: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    pub opaque: bool,
    pub body_length: usize,
    pub hashes: FingerprintSet,
    pub extracts: Extracteds,
    /// Distance to the baseline, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
    /// Near-duplicate of the baseline
    pub soft: bool,
}

/// Colored console output for the command-line driver
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        // Simple check for color support - assume true for most terminals
        let use_colors = std::env::var("NO_COLOR").is_err() &&
                        std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    /// Print one scanned response with its fingerprints and extracted items
    pub fn print_record(&self, record: &ScanRecord) {
        if self.quiet_mode { return; }

        let mut line = String::new();
        if self.use_colors {
            line.push_str(&format!("{} ", record.source.green().bold()));
            line.push_str(&format!("{} ", format!("{:>6}", record.body_length).yellow().bold()));
            line.push_str(&record.title.bright_white().underline().to_string());
        } else {
            line.push_str(&format!("{} {:>6} {}", record.source, record.body_length, record.title));
        }

        let mut tags = Vec::new();
        if let Some(server) = &record.server {
            tags.push(format!("server:{}", server));
        }
        if let Some(language) = &record.language {
            tags.push(format!("lang:{}", language));
        }
        if let Some(charset) = &record.charset {
            tags.push(format!("charset:{}", charset));
        }
        if let Some(distance) = record.distance {
            tags.push(format!("sim:{}", distance));
        }
        if record.opaque {
            tags.push("unsplit".to_string());
        }
        for tag in tags {
            line.push_str(&format!(" [{}]", tag));
        }

        if record.soft {
            if self.use_colors {
                line.push_str(&format!(" {}", "[soft]".yellow()));
            } else {
                line.push_str(" [soft]");
            }
        }
        println!("{}", line);

        let hashes = format!(
            "md5:{} simhash:{} mmh3:{}",
            record.hashes.body_md5, record.hashes.body_simhash, record.hashes.body_mmh3
        );
        if self.use_colors {
            println!("    └─ {}", hashes.bright_black());
        } else {
            println!("    └─ {}", hashes);
        }

        let extracts = record.extracts.clone().non_empty();
        if extracts.is_empty() {
            return;
        }
        if self.use_colors {
            println!("    └─ {}", extracts.to_string().trim_end().cyan());
        } else {
            println!("    └─ {}", extracts.to_string().trim_end());
        }
        for e in &extracts {
            println!("       {} ({}) items :", e.name, e.matches.len());
            for m in &e.matches {
                println!("\t{}", m.truncate_with_ellipsis(200));
            }
        }
    }

    /// Print a three-way simhash comparison and its verdict
    pub fn print_distances(&self, distances: &Distances, threshold: SimilarityThreshold) {
        if self.quiet_mode { return; }

        let verdict = if distances.is_near_duplicate(threshold) {
            "near-duplicate"
        } else {
            "distinct"
        };

        if self.use_colors {
            println!("  body   {}", distances.body.to_string().yellow().bold());
            println!("  header {}", distances.header.to_string().yellow().bold());
            println!("  raw    {}", distances.raw.to_string().yellow().bold());
            println!("  {} (threshold {})", verdict.bright_white().bold(), threshold.0);
        } else {
            println!("  body   {}", distances.body);
            println!("  header {}", distances.header);
            println!("  raw    {}", distances.raw);
            println!("  {} (threshold {})", verdict, threshold.0);
        }
    }

    /// Print a clean section header
    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
        }
    }

    /// Print a clean success message
    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    /// Print a clean warning message
    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Print a clean error message
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    /// Print a clean info message
    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

/// String extension trait for better output formatting
trait StringExt {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String;
}

impl StringExt for str {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String {
        if self.chars().count() <= max_len {
            self.to_string()
        } else {
            let kept: String = self.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}
