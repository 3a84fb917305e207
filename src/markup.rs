//! Light formatting for assistant replies.
//!
//! Reply text is parsed into a small render tree instead of being rewritten
//! in place, so renderers decide escaping on their own. Supported markup:
//! blank lines split paragraphs, single newlines break lines, and `**bold**`
//! marks a strong run. Anything else is plain text.

const STRONG_MARKER: &str = "**";

/// A run of text inside a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
}

impl Inline {
    pub fn text(&self) -> &str {
        match self {
            Inline::Text(text) | Inline::Strong(text) => text,
        }
    }
}

/// One visual line of a paragraph
pub type InlineLine = Vec<Inline>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub lines: Vec<InlineLine>,
}

/// Parsed reply, ready to be rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }
}

/// Parse assistant text into a [`Document`]
pub fn parse(text: &str) -> Document {
    let normalized = text.replace("\r\n", "\n");
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(paragraph(&current));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(paragraph(&current));
    }

    Document { paragraphs }
}

fn paragraph(lines: &[&str]) -> Paragraph {
    Paragraph {
        lines: lines.iter().map(|line| parse_inline(line)).collect(),
    }
}

/// Split a line into plain and strong runs. A marker with no closing
/// partner, or with nothing between the pair, is kept as literal text.
fn parse_inline(line: &str) -> InlineLine {
    let mut runs = Vec::new();
    let mut plain = String::new();
    let mut rest = line;

    while let Some(open) = rest.find(STRONG_MARKER) {
        let after_open = &rest[open + STRONG_MARKER.len()..];
        match after_open.find(STRONG_MARKER) {
            Some(close) if close > 0 => {
                plain.push_str(&rest[..open]);
                if !plain.is_empty() {
                    runs.push(Inline::Text(std::mem::take(&mut plain)));
                }
                runs.push(Inline::Strong(after_open[..close].to_string()));
                rest = &after_open[close + STRONG_MARKER.len()..];
            }
            Some(_) => {
                // "****" has no content; keep it as written
                plain.push_str(&rest[..open + 2 * STRONG_MARKER.len()]);
                rest = &after_open[STRONG_MARKER.len()..];
            }
            None => break,
        }
    }

    plain.push_str(rest);
    if !plain.is_empty() {
        runs.push(Inline::Text(plain));
    }
    runs
}

/// Render as HTML. Every text run is escaped.
pub fn to_html(document: &Document) -> String {
    let mut html = String::new();
    for paragraph in &document.paragraphs {
        html.push_str("<p>");
        for (index, line) in paragraph.lines.iter().enumerate() {
            if index > 0 {
                html.push_str("<br>");
            }
            for run in line {
                match run {
                    Inline::Text(text) => html.push_str(&escape_html(text)),
                    Inline::Strong(text) => {
                        html.push_str("<strong>");
                        html.push_str(&escape_html(text));
                        html.push_str("</strong>");
                    }
                }
            }
        }
        html.push_str("</p>");
    }
    html
}

/// Render as plain text with the markers removed
pub fn to_plain(document: &Document) -> String {
    document
        .paragraphs
        .iter()
        .map(|paragraph| {
            paragraph
                .lines
                .iter()
                .map(|line| line.iter().map(Inline::text).collect::<String>())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_title_then_paragraph() {
        let document = parse("**Beach House**\n\ngreat view");

        assert_eq!(document.paragraphs.len(), 2);
        assert_eq!(
            document.paragraphs[0].lines,
            vec![vec![Inline::Strong("Beach House".to_string())]]
        );
        assert_eq!(
            to_html(&document),
            "<p><strong>Beach House</strong></p><p>great view</p>"
        );
    }

    #[test]
    fn single_newline_is_a_line_break() {
        let document = parse("line one\nline two");
        assert_eq!(document.paragraphs.len(), 1);
        assert_eq!(document.paragraphs[0].lines.len(), 2);
        assert_eq!(to_html(&document), "<p>line one<br>line two</p>");
    }

    #[test]
    fn extra_blank_lines_collapse() {
        let document = parse("a\r\n\r\n\r\n\nb\n");
        assert_eq!(to_html(&document), "<p>a</p><p>b</p>");
    }

    #[test]
    fn strong_inside_text() {
        let line = parse_inline("Try the **Lake Cabin** or the **Loft**.");
        assert_eq!(
            line,
            vec![
                Inline::Text("Try the ".to_string()),
                Inline::Strong("Lake Cabin".to_string()),
                Inline::Text(" or the ".to_string()),
                Inline::Strong("Loft".to_string()),
                Inline::Text(".".to_string()),
            ]
        );
    }

    #[test]
    fn unmatched_marker_stays_literal() {
        assert_eq!(
            parse_inline("rated **4.5 stars"),
            vec![Inline::Text("rated **4.5 stars".to_string())]
        );
        assert_eq!(
            parse_inline("a **** b"),
            vec![Inline::Text("a **** b".to_string())]
        );
    }

    #[test]
    fn html_is_escaped() {
        let document = parse("<script>alert('x')</script> & **<b>**");
        assert_eq!(
            to_html(&document),
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; <strong>&lt;b&gt;</strong></p>"
        );
    }

    #[test]
    fn plain_drops_markers() {
        let document = parse("**Beach House**\n\ngreat view");
        assert_eq!(to_plain(&document), "Beach House\n\ngreat view");
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(parse("  \n\n ").is_empty());
    }
}
