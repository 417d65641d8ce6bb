//! Summary export: re-wrap a summary to a fixed page width and paginate it into a plain text
//! document.

use anyhow::{Context, Result};
use std::path::Path;

/// Separator written between pages (form feed on its own line).
pub const PAGE_BREAK: &str = "\u{000C}";

/// Page geometry for exported documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Maximum characters per line.
    pub width: usize,
    pub lines_per_page: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            width: 90,
            lines_per_page: 60,
        }
    }
}

impl From<&crate::config::ClientConfig> for PageLayout {
    fn from(c: &crate::config::ClientConfig) -> Self {
        Self {
            width: c.page_width.max(1),
            lines_per_page: c.lines_per_page.max(1),
        }
    }
}

/// A summary laid out as pages of wrapped lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pages: Vec<Vec<String>>,
}

impl ExportDocument {
    pub fn from_summary(summary: &str, layout: &PageLayout) -> Self {
        let lines = wrap_text(summary, layout.width);
        let pages = lines
            .chunks(layout.lines_per_page.max(1))
            .map(|c| c.to_vec())
            .collect();
        Self { pages }
    }

    pub fn pages(&self) -> &[Vec<String>] {
        &self.pages
    }

    /// All lines in order, ignoring page boundaries.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flatten().map(String::as_str)
    }

    /// Plain text rendering: one line per wrapped line, pages separated by a form-feed line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                out.push_str(PAGE_BREAK);
                out.push('\n');
            }
            for line in page {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())
            .with_context(|| format!("writing summary to {}", path.display()))?;
        log::info!("exported summary to {}", path.display());
        Ok(())
    }
}

/// Suggested file name for an export, stamped with local time.
pub fn default_file_name() -> String {
    format!(
        "aircooled_summary_{}.txt",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

/// Wrap every line of `text` to at most `width` characters.
///
/// Lines that already fit are kept exactly (minus trailing whitespace). Longer lines break at
/// whitespace, keeping the original gaps between words that stay together; words longer than
/// the available width are split. Blank lines are kept. Continuation lines repeat the source
/// line's indentation.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw in text.lines() {
        let line = raw.trim_end();
        if line.chars().count() <= width {
            out.push(line.to_string());
            continue;
        }
        let indent_len = line.len() - line.trim_start().len();
        let mut indent = line[..indent_len].replace('\t', "    ");
        if indent.chars().count() >= width / 2 {
            indent.clear();
        }
        wrap_line(line.trim_start(), &indent, width, &mut out);
    }
    out
}

/// Split `s` into words, each paired with the whitespace run that precedes it.
fn words_with_gaps(s: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = s;
    loop {
        let word_start = rest
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(rest.len());
        let (gap, tail) = rest.split_at(word_start);
        let word_end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let (word, next) = tail.split_at(word_end);
        if word.is_empty() {
            break;
        }
        out.push((gap, word));
        rest = next;
    }
    out
}

fn wrap_line(line: &str, indent: &str, width: usize, out: &mut Vec<String>) {
    let indent_chars = indent.chars().count();
    let avail = width - indent_chars;
    let mut current = indent.to_string();
    let mut current_chars = indent_chars;

    for (gap, word) in words_with_gaps(line) {
        let word_chars = word.chars().count();
        if word_chars > avail {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(avail) {
                if current_chars > indent_chars {
                    out.push(std::mem::replace(&mut current, indent.to_string()));
                }
                current.extend(piece);
                current_chars = indent_chars + piece.len();
            }
            continue;
        }
        if current_chars > indent_chars {
            let gap_chars = gap.chars().count();
            if current_chars + gap_chars + word_chars > width {
                // The gap at a break point is dropped.
                out.push(std::mem::replace(&mut current, indent.to_string()));
                current_chars = indent_chars;
            } else {
                current.push_str(gap);
                current_chars += gap_chars;
            }
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if current_chars > indent_chars {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn short_lines_are_unchanged() {
        let summary = "## Vehicle\n\n- 1975 911S\n- 2.7 MFI";
        let doc = ExportDocument::from_summary(summary, &PageLayout::default());
        assert_eq!(doc.to_text(), "## Vehicle\n\n- 1975 911S\n- 2.7 MFI\n");
        assert_eq!(doc.pages().len(), 1);
    }

    #[test]
    fn long_line_wraps_at_width_without_losing_words() {
        let text = "Check the CIS warm-up regulator control pressure cold and warm, then compare \
                    against the factory specification before replacing the fuel distributor.";
        let lines = wrap_text(text, 30);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 30));
        let rejoined = lines.join(" ");
        assert_eq!(words(&rejoined), words(text));
    }

    #[test]
    fn unwrapping_reconstructs_summary() {
        let summary = concat!(
            "# Summary\n\n",
            "Key details: 1978 911SC, 130k miles, SSI heat exchangers fitted.\n\n",
            "  - Idle hunts between 700 and 1100 rpm once the engine is warm and the ",
            "auxiliary air valve has closed.\n",
            "- Recommend a smoke test of the intake boots.",
        );
        let layout = PageLayout { width: 24, lines_per_page: 5 };
        let doc = ExportDocument::from_summary(summary, &layout);
        assert!(doc.pages().len() > 1);
        assert!(doc.lines().all(|l| l.chars().count() <= 24));
        let unwrapped: Vec<&str> = doc.lines().collect();
        assert_eq!(words(&unwrapped.join(" ")), words(summary));
    }

    #[test]
    fn interior_spacing_survives_export() {
        let summary = "Torque:    24 Nm\n    code   block";
        let doc = ExportDocument::from_summary(summary, &PageLayout::default());
        assert_eq!(doc.to_text(), "Torque:    24 Nm\n    code   block\n");
    }

    #[test]
    fn wrapped_line_keeps_gaps_between_words_on_the_same_line() {
        let lines = wrap_text("Torque:    24 Nm and then the   rest of it", 20);
        assert_eq!(lines, vec!["Torque:    24 Nm and", "then the   rest of", "it"]);
    }

    #[test]
    fn continuation_keeps_indent() {
        let lines = wrap_text("    - one two three four five", 16);
        assert_eq!(lines[0], "    - one two");
        assert!(lines[1..].iter().all(|l| l.starts_with("    ")));
    }

    #[test]
    fn overlong_word_is_split() {
        let url = "https://www.pelicanparts.com/techarticles/Porsche-911-Engine-Rebuild.htm";
        let lines = wrap_text(url, 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.concat(), url);
    }

    #[test]
    fn pages_are_separated_by_form_feed() {
        let layout = PageLayout { width: 10, lines_per_page: 2 };
        let doc = ExportDocument::from_summary("a\nb\nc", &layout);
        assert_eq!(doc.to_text(), "a\nb\n\u{000C}\nc\n");
    }

    #[test]
    fn empty_summary_has_no_pages() {
        let doc = ExportDocument::from_summary("", &PageLayout::default());
        assert!(doc.pages().is_empty());
        assert_eq!(doc.to_text(), "");
    }

    #[test]
    fn default_file_name_is_txt() {
        let name = default_file_name();
        assert!(name.starts_with("aircooled_summary_"));
        assert!(name.ends_with(".txt"));
    }
}
