//! Plain-text rendering of the HTML the service returns for office documents.

use regex::Regex;

pub struct MarkupRenderer {
    hidden_re: Regex,
    break_re: Regex,
    cell_re: Regex,
    tag_re: Regex,
    space_re: Regex,
}

impl MarkupRenderer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            hidden_re: Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>")?,
            break_re: Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6]|table|section|article)>")?,
            cell_re: Regex::new(r"(?i)</t[dh]>")?,
            tag_re: Regex::new(r"<[^>]+>")?,
            space_re: Regex::new(r"[ \t\u{a0}]+")?,
        })
    }

    /// Strips tags and decodes entities. Block boundaries become line breaks,
    /// table cells are separated by ` | `, and runs of blank lines collapse
    /// into one.
    pub fn to_lines(&self, html: &str) -> Vec<String> {
        let text = self.hidden_re.replace_all(html, "");
        let text = self.break_re.replace_all(&text, "\n");
        let text = self.cell_re.replace_all(&text, " | ");
        let text = self.tag_re.replace_all(&text, "");
        let text = html_escape::decode_html_entities(&text);

        let mut lines = Vec::new();
        let mut blank = true;
        for line in text.lines() {
            let line = self.space_re.replace_all(line, " ");
            let line = line.trim().trim_end_matches('|').trim_end();
            if line.is_empty() {
                if !blank {
                    lines.push(String::new());
                }
                blank = true;
            } else {
                lines.push(line.to_string());
                blank = false;
            }
        }
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_lines() {
        let renderer = MarkupRenderer::new().unwrap();
        let lines = renderer.to_lines(
            "<html><head><title>x</title></head><body><h1>Report</h1><p>Costs &amp; revenue</p>\n\n<p>Q1&nbsp;&nbsp;results<br/>up 3&#37;</p></body></html>",
        );
        assert_eq!(lines, vec!["Report", "Costs & revenue", "", "Q1 results", "up 3%"]);
    }

    #[test]
    fn tables_keep_cell_boundaries() {
        let renderer = MarkupRenderer::new().unwrap();
        let lines = renderer.to_lines(
            "<table><tr><th>Item</th><th>Cost</th></tr><tr><td>Paper</td><td>&lt;5</td></tr></table>",
        );
        assert_eq!(lines, vec!["Item | Cost", "Paper | <5"]);
    }

    #[test]
    fn scripts_and_blank_runs_are_dropped() {
        let renderer = MarkupRenderer::new().unwrap();
        let lines = renderer.to_lines("<script>alert(1)</script><p>a</p><p> </p><p></p><p>b</p>");
        assert_eq!(lines, vec!["a", "", "b"]);
    }
}
