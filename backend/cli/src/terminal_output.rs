//! Terminal output: notes, score tables and poem display.

use poemforge_core::{Criterion, Judgment, Winner};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn styled(style: &str, text: &str) -> String {
    if supports_color() {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

pub fn banner(title: &str) {
    let rule = "=".repeat(60);
    println!("\n{rule}\n{}\n{rule}", styled(BOLD, title));
}

pub enum Align {
    Left,
    Right,
}

pub struct Column {
    pub header: String,
    pub align: Align,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Left }
    }
    pub fn right(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Right }
    }
}

/// Render a table with given columns and rows.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| strip_ansi(&c.header).chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns.len()) {
            widths[i] = widths[i].max(strip_ansi(cell).chars().count());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    let mut out = format!("  {}  \n", styled(BOLD, &header.join("  ")));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}  \n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| pad_cell(row.get(i).map(String::as_str).unwrap_or(""), widths[i], &col.align))
            .collect();
        out.push_str(&format!("  {}  \n", cells.join("  ")));
    }
    out
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = width.saturating_sub(strip_ansi(s).chars().count());
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}

pub fn print_poem<S: AsRef<str>>(title: &str, agent: &str, verses: &[S]) {
    println!("\n{}", styled(BOLD, &format!("{title} - {agent}")));
    println!("{}", "-".repeat(60));
    for (i, verse) in verses.iter().enumerate() {
        println!("{}. {}", i + 1, verse.as_ref());
    }
}

/// Per-criterion score rows, then the total.
pub fn score_rows(judgment: &Judgment) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Criterion::ALL
        .iter()
        .map(|c| {
            let max = c.max_points();
            vec![
                c.label().to_string(),
                format!("{}/{max}", judgment.scores_a().get(c).copied().unwrap_or_default()),
                format!("{}/{max}", judgment.scores_b().get(c).copied().unwrap_or_default()),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".to_string(),
        format!("{}/100", judgment.total_a()),
        format!("{}/100", judgment.total_b()),
    ]);
    rows
}

pub fn print_judgment(judgment: &Judgment, label_a: &str, label_b: &str) {
    banner("JUDGMENT");
    let columns = [Column::left("Criterion"), Column::right("Poem A"), Column::right("Poem B")];
    print!("{}", render_table(&columns, &score_rows(judgment)));

    let verdict = match judgment.winner() {
        Winner::A => format!("Winner: Poem A ({label_a})"),
        Winner::B => format!("Winner: Poem B ({label_b})"),
        Winner::Tie => "Result: tie".to_string(),
    };
    println!("\n{}", styled(GREEN, &verdict));
    if !judgment.justification().is_empty() {
        println!("\n{}", judgment.justification());
    }
    for (heading, items) in [("Strengths", judgment.strengths()), ("To improve", judgment.improvements())] {
        if !items.is_empty() {
            println!("\n{}", styled(DIM, heading));
            for item in items {
                println!("  - {item}");
            }
        }
    }
}
