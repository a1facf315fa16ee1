use outfitter::{Analysis, ConflictPair, RuleFile, SourcedEntry};
use std::path::Path;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(data_dir: &Path, files: &[RuleFile], analysis: &Analysis, color: bool, conflicts_only: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Data: {}", data_dir.display()), ansi::CYAN)));

    if !conflicts_only {
        println!("\n{}", palette.paint("━━━ Rule files ━━━", ansi::GRAY));
        print_files(files, &palette);
    }

    println!("\n{}", palette.paint("━━━ Conflicts ━━━", ansi::GRAY));
    print_conflicts(analysis, &palette);

    if !conflicts_only {
        println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
        let metrics = &analysis.metrics;
        println!(
            "  Total: {}  │  Extraction: {}  │  Conflicts: {}  │  Resolve: {}",
            palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
            palette.paint(format!("{:?}", metrics.extraction.duration), ansi::CYAN),
            palette.paint(format!("{:?}", metrics.conflicts.duration), ansi::CYAN),
            palette.dim(format!("{:?}", metrics.resolve.duration)),
        );
    }
    println!();
}

fn print_files(files: &[RuleFile], palette: &ansi::Palette) {
    if files.is_empty() {
        println!("{}", palette.dim("  No rule files with outfit rules found"));
        return;
    }
    for file in files {
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{}]", file.dialect.label()), ansi::BLUE),
            palette.bold(&file.relative_path),
            palette.dim("│"),
            palette.paint(format!("{} outfit rules", file.outfit_rule_count), ansi::GREEN),
        );
        println!(
            "      {} {}  {} {}",
            palette.dim("lines:"),
            palette.paint(file.key_value_count().to_string(), ansi::YELLOW),
            palette.dim("│ comments:"),
            palette.paint(file.comment_count().to_string(), ansi::YELLOW),
        );
    }
}

fn print_conflicts(analysis: &Analysis, palette: &ansi::Palette) {
    let report = &analysis.conflicts;
    if report.is_empty() {
        println!("{}", palette.paint("  ✓ No conflicting entries", ansi::GREEN));
        return;
    }

    let certain: Vec<&ConflictPair> = report.certain().collect();
    let possible: Vec<&ConflictPair> = report.possible().collect();

    if certain.is_empty() {
        println!("{}", palette.paint("  ✓ No confirmed conflicts", ansi::GREEN));
    }
    for pair in &certain {
        print_pair(analysis, pair, "✗", palette);
    }

    if !possible.is_empty() {
        println!("\n  {}", palette.dim("Possible conflicts (unresolved filters):"));
        for pair in &possible {
            print_pair(analysis, pair, "?", palette);
        }
    }

    let settled = certain.iter().filter(|p| p.resolved_by_filename()).count();
    println!(
        "\n  {} conflicts  {}  {} settled by load order  {}  {} possible",
        palette.bold(certain.len().to_string()),
        palette.dim("│"),
        palette.paint(settled.to_string(), ansi::GREEN),
        palette.dim("│"),
        palette.dim(possible.len().to_string()),
    );
}

fn print_pair(analysis: &Analysis, pair: &ConflictPair, marker: &str, palette: &ansi::Palette) {
    let (first, second) = (&analysis.entries[pair.first], &analysis.entries[pair.second]);
    println!("  {} {}", palette.paint(marker, ansi::YELLOW), fmt_entry(first, palette));
    println!("    {}", fmt_entry(second, palette));
    match pair.winner {
        Some(winner) => println!(
            "    {} {}",
            palette.dim("→ load order picks"),
            palette.paint(&analysis.entries[winner].origin.relative_path, ansi::GREEN)
        ),
        None => println!("    {}", palette.paint("→ same file, order is ambiguous", ansi::YELLOW)),
    }
}

fn fmt_entry(sourced: &SourcedEntry, palette: &ansi::Palette) -> String {
    let outfit = sourced.entry.outfit.as_ref().map(ToString::to_string).unwrap_or_default();
    let mut text = format!(
        "{} {}",
        palette.paint(format!("{}:{}", sourced.origin.relative_path, sourced.origin.line_number), ansi::YELLOW),
        palette.paint(outfit, ansi::CYAN),
    );
    if !sourced.is_fully_resolved() {
        text.push_str(&palette.dim(format!("  (unresolved: {})", sourced.unresolved_filters.join(", "))));
    }
    text
}
