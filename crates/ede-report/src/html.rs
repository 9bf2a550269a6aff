//! Self-contained printable HTML

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::document::{Block, Report, ReportSection, TextBlock};

const STYLE: &str = "\
@page { size: A4; margin: 1.8cm; }
body { font-family: Helvetica, Arial, sans-serif; font-size: 10pt; color: #222; }
h1 { font-size: 18pt; margin-bottom: 4pt; }
h2 { font-size: 13pt; margin: 0 0 6pt 0; }
.generated { color: #666; margin-top: 0; }
.question { border-left: 3px solid #999; padding-left: 8pt; margin-bottom: 14pt; }
section { page-break-inside: avoid; break-inside: avoid; margin-bottom: 18pt; }
table { border-collapse: collapse; width: 100%; table-layout: fixed; }
th, td { border: 1px solid #bbb; padding: 3pt 5pt; text-align: left; vertical-align: top; \
word-wrap: break-word; overflow-wrap: anywhere; white-space: normal; }
th { background: #eee; }
img { display: block; margin: 6pt 0; }
.missing { color: #a00; font-style: italic; }
.text { margin: 6pt 0; white-space: pre-wrap; }
.placeholder { color: #888; }
";

/// Render a report to one HTML document
#[must_use]
pub fn render_html(report: &Report) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", encode_text(&report.title));
    let _ = writeln!(out, "<style>\n{STYLE}</style>\n</head>\n<body>");
    let _ = writeln!(out, "<h1>{}</h1>", encode_text(&report.title));
    let _ = writeln!(
        out,
        "<p class=\"generated\">{}</p>",
        encode_text(&report.generated_line())
    );

    if let Some(question) = &report.question {
        let _ = writeln!(
            out,
            "<div class=\"question\"><strong>Context / Question:</strong><p class=\"text\">{}</p></div>",
            encode_text(question)
        );
    }

    for section in &report.sections {
        render_section(&mut out, section);
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_section(out: &mut String, section: &ReportSection) {
    let _ = writeln!(
        out,
        "<section id=\"{}\">\n<h2>{}</h2>",
        encode_double_quoted_attribute(section.key.as_str()),
        encode_text(&section.title)
    );
    render_block(out, &section.body, &section.title);
    for text in &section.texts {
        render_text(out, text);
    }
    out.push_str("</section>\n");
}

fn render_block(out: &mut String, block: &Block, alt: &str) {
    match block {
        Block::Image {
            bytes,
            mime,
            width,
            height,
        } => {
            let _ = writeln!(
                out,
                "<img src=\"data:{};base64,{}\" width=\"{width}\" height=\"{height}\" alt=\"{}\">",
                encode_double_quoted_attribute(mime),
                STANDARD.encode(bytes),
                encode_double_quoted_attribute(alt)
            );
        }
        Block::ImageMissing => out.push_str("<p class=\"missing\">[Image missing]</p>\n"),
        Block::Table { header, rows } => {
            out.push_str("<table>\n");
            if !header.is_empty() {
                out.push_str("<thead><tr>");
                for cell in header {
                    let _ = write!(out, "<th>{}</th>", encode_text(cell));
                }
                out.push_str("</tr></thead>\n");
            }
            out.push_str("<tbody>\n");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    let _ = write!(out, "<td>{}</td>", encode_text(cell));
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</tbody>\n</table>\n");
        }
    }
}

fn render_text(out: &mut String, text: &TextBlock) {
    let class = if text.placeholder {
        "text placeholder"
    } else {
        "text"
    };
    let _ = writeln!(
        out,
        "<p class=\"{class}\" data-kind=\"{}\"><strong>{}:</strong> {}</p>",
        text.kind,
        encode_text(&text.label),
        encode_text(&text.text)
    );
}
