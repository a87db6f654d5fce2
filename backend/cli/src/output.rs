//! Terminal output: ANSI styling, status notes and plain tables.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

fn paint(color: &str, s: &str) -> String {
    if supports_color() {
        format!("{color}{s}{RESET}")
    } else {
        s.to_string()
    }
}

pub fn ok(s: &str) -> String {
    paint(GREEN, s)
}

pub fn warn(s: &str) -> String {
    paint(YELLOW, s)
}

pub fn fail(s: &str) -> String {
    paint(RED, s)
}

pub fn dim(s: &str) -> String {
    paint(DIM, s)
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

fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/// Render `rows` under `headers`, left-aligned, two spaces between columns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c}{}", " ".repeat(w.saturating_sub(visible_width(c)))))
            .collect();
        format!("  {}\n", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    let header = line(headers.iter().map(|h| h.to_string()).collect());
    if supports_color() {
        out.push_str(&format!("{BOLD}{}{RESET}\n", header.trim_end_matches('\n')));
    } else {
        out.push_str(&header);
    }
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        let cells = (0..widths.len())
            .map(|i| row.get(i).cloned().unwrap_or_default())
            .collect();
        out.push_str(&line(cells));
    }
    out
}

/// Shorten to `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_escape_codes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn table_aligns_columns() {
        std::env::set_var("NO_COLOR", "1");
        let table = render_table(
            &["name", "ok"],
            &[vec!["google_vision".into(), "yes".into()], vec!["x".into(), "no".into()]],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "  name           ok");
        assert_eq!(lines[2], "  google_vision  yes");
        assert_eq!(lines[3], "  x              no");
    }

    #[test]
    fn truncates_multiline_text() {
        assert_eq!(truncate("ab\ncd", 10), "ab cd");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
