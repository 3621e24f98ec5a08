//! Markdown <-> rich-editor HTML conversion that keeps TeX formulas intact.
//!
//! Formulas are swapped for `%%MATH<n>%%` placeholders before the text goes
//! through a markdown renderer or an HTML converter, and put back afterwards,
//! so neither engine ever sees the TeX source.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

const PLACEHOLDER_PREFIX: &str = "%%MATH";

pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

pub trait HtmlToMarkdown: Send + Sync {
    fn convert(&self, html: &str) -> String;
}

lazy_static! {
    static ref MATH: Regex =
        Regex::new(r"(\$\$[\s\S]*?\$\$|\$[^$\n]*?\$)").expect("valid math pattern");
    static ref PLACEHOLDER: Regex =
        Regex::new(r"%%MATH(\d+)%%").expect("valid placeholder pattern");
    static ref PARAGRAPH: Regex =
        Regex::new(r"(?s)<p\b[^>]*>(.*?)</p>").expect("valid paragraph pattern");
    static ref SPAN: Regex =
        Regex::new(r"(?s)<span\b([^>]*)>(.*?)</span>").expect("valid span pattern");
    static ref DATA_VALUE: Regex =
        Regex::new(r#"data-value="([^"]*)""#).expect("valid attribute pattern");
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("valid tag pattern");
    static ref HEADING: Regex =
        Regex::new(r"(?s)<h([1-6])\b[^>]*>(.*?)</h[1-6]>").expect("valid heading pattern");
    static ref LINE_BREAK: Regex = Regex::new(r"<br\s*/?>").expect("valid break pattern");
    static ref EXTRA_BLANKS: Regex = Regex::new(r"\n{3,}").expect("valid blank-line pattern");
    static ref BLANK_LINE: Regex = Regex::new(r"\n\s*\n").expect("valid blank-line pattern");
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}%%")
}

/// Replaces `$$…$$` and `$…$` with placeholders. Returns the protected text and
/// the formulas without their delimiters.
pub fn protect_math(markdown: &str) -> (String, Vec<String>) {
    let mut formulas = Vec::new();
    let protected = MATH.replace_all(markdown, |caps: &Captures| {
        let found = &caps[0];
        let inner = if found.starts_with("$$") && found.len() >= 4 {
            &found[2..found.len() - 2]
        } else {
            &found[1..found.len() - 1]
        };
        formulas.push(inner.to_string());
        placeholder(formulas.len() - 1)
    });
    (protected.into_owned(), formulas)
}

/// Puts formulas back as editor formula spans.
pub fn restore_math(html: &str, formulas: &[String]) -> String {
    PLACEHOLDER
        .replace_all(html, |caps: &Captures| {
            match caps[1].parse::<usize>().ok().and_then(|index| formulas.get(index)) {
                Some(formula) => format!(
                    "<span class=\"ql-formula\" data-value=\"{}\"></span>",
                    escape_html(formula)
                ),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn markdown_to_editor_html(markdown: &str, renderer: &dyn MarkdownRenderer) -> String {
    let (protected, formulas) = protect_math(markdown);
    restore_math(&renderer.render(&protected), &formulas)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExtractedFormula {
    formula: String,
    block: bool,
}

/// Converts editor HTML back to markdown.
///
/// A formula span alone in its paragraph becomes a `$$` block, otherwise an
/// inline `$…$`. Spans without `data-value` count as formulas when their text
/// contains `\` or `=`; any other span is unwrapped.
pub fn editor_html_to_markdown(html: &str, converter: &dyn HtmlToMarkdown) -> String {
    let mut formulas: Vec<ExtractedFormula> = Vec::new();

    let with_paragraphs = PARAGRAPH.replace_all(html, |caps: &Captures| {
        let whole = &caps[0];
        let inner = &caps[1];
        let spans: Vec<_> = SPAN.captures_iter(inner).collect();
        let formula_spans = spans
            .iter()
            .filter(|span| span_formula(span).is_some())
            .count();
        let rest = SPAN.replace_all(inner, |span: &Captures| {
            if span_formula(span).is_some() {
                String::new()
            } else {
                span[2].to_string()
            }
        });
        let alone = formula_spans == 1 && text_of(&rest).trim().is_empty();
        replace_spans(whole, alone, &mut formulas)
    });
    let replaced = replace_spans(&with_paragraphs, false, &mut formulas);

    let markdown = converter.convert(&replaced);
    PLACEHOLDER
        .replace_all(&markdown, |caps: &Captures| {
            match caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| formulas.get(index))
            {
                Some(ExtractedFormula {
                    formula,
                    block: true,
                }) => format!("\n$$\n{formula}\n$$\n"),
                Some(ExtractedFormula { formula, .. }) => format!("${formula}$"),
                None => caps[0].to_string(),
            }
        })
        .trim()
        .to_string()
}

fn replace_spans(html: &str, block: bool, formulas: &mut Vec<ExtractedFormula>) -> String {
    SPAN
        .replace_all(html, |caps: &Captures| match span_formula(caps) {
            Some(formula) => {
                formulas.push(ExtractedFormula { formula, block });
                placeholder(formulas.len() - 1)
            }
            None => caps[2].to_string(),
        })
        .into_owned()
}

fn span_formula(caps: &Captures) -> Option<String> {
    if let Some(value) = DATA_VALUE.captures(&caps[1]) {
        let formula = unescape_html(&value[1]);
        if !formula.is_empty() {
            return Some(formula);
        }
    }
    let text = text_of(&caps[2]);
    (text.contains('\\') || text.contains('=')).then_some(text)
}

fn text_of(html: &str) -> String {
    unescape_html(&TAG.replace_all(html, ""))
}

/// Stored chapter content arrives with doubled backslashes.
pub fn unescape_stored_content(content: &str) -> String {
    content.replace("\\\\", "\\")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Paragraph and ATX-heading support only. Single newlines inside a paragraph
/// become `<br>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicMarkdown;

impl MarkdownRenderer for BasicMarkdown {
    fn render(&self, markdown: &str) -> String {
        let normalized = markdown.replace("\r\n", "\n");
        let mut html = String::new();
        for block in blank_line_split(&normalized) {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }
            let level = block.chars().take_while(|ch| *ch == '#').count();
            if (1..=6).contains(&level) && block[level..].starts_with(' ') {
                html.push_str(&format!(
                    "<h{level}>{}</h{level}>",
                    escape_html(block[level..].trim())
                ));
            } else {
                let lines: Vec<String> =
                    block.lines().map(|line| escape_html(line.trim())).collect();
                html.push_str(&format!("<p>{}</p>", lines.join("<br>")));
            }
        }
        html
    }
}

impl HtmlToMarkdown for BasicMarkdown {
    fn convert(&self, html: &str) -> String {
        let text = LINE_BREAK.replace_all(html, "\n");
        let text = HEADING.replace_all(&text, |caps: &Captures| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
        });
        let text = PARAGRAPH.replace_all(&text, "\n\n$1\n\n");
        let text = text_of(&text);
        EXTRA_BLANKS.replace_all(text.trim(), "\n\n").into_owned()
    }
}

fn blank_line_split(text: &str) -> Vec<&str> {
    BLANK_LINE.split(text).collect()
}

#[cfg(test)]
#[path = "tests/markdown_tests.rs"]
mod tests;
