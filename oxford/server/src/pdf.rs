//! Plain text PDF export of meeting minutes.
//!
//! The writer emits a minimal PDF 1.4 file: one Helvetica font, one text
//! content stream per page and a cross-reference table with exact byte
//! offsets. Text outside printable ASCII is replaced with `?`.

use std::fmt::Write as _;

use crate::form::{FieldKind, RecordForm};

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 50;
const LINE_HEIGHT: u32 = 14;
const LINES_PER_PAGE: usize = 48;
const WRAP_AT: usize = 90;

/// `Meeting_Minutes_<date>.pdf`, or `Meeting_Minutes_Draft.pdf` without a date.
/// Only ASCII letters, digits, `-` and `_` of the date are kept.
pub fn minutes_filename(meeting_date: &str) -> String {
    let date: String = meeting_date
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if date.is_empty() {
        "Meeting_Minutes_Draft.pdf".to_string()
    } else {
        format!("Meeting_Minutes_{date}.pdf")
    }
}

/// One printable line per field, long text wrapped and indented.
pub fn minutes_lines(form: &RecordForm) -> Vec<String> {
    let mut lines = Vec::new();
    for field in form.fields() {
        match field.kind {
            FieldKind::Checkbox => {
                let mark = if form.flag(field.name) { "x" } else { " " };
                lines.push(format!("[{mark}] {}", field.label));
            }
            _ => {
                let mut text = form.text(field.name).lines();
                let first = text.next().unwrap_or_default();
                push_wrapped(&mut lines, &format!("{}: {first}", field.label));
                for more in text {
                    push_wrapped(&mut lines, &format!("    {more}"));
                }
            }
        }
    }
    lines
}

fn push_wrapped(lines: &mut Vec<String>, line: &str) {
    let text = line.trim_start_matches(' ');
    let indent = &line[..line.len() - text.len()];
    let mut current = indent.to_string();
    for word in text.split(' ') {
        let started = current.len() > indent.len();
        if started && current.chars().count() + 1 + word.chars().count() > WRAP_AT {
            lines.push(std::mem::take(&mut current));
            current.push_str("    ");
            current.push_str(indent);
        } else if started {
            current.push(' ');
        }
        current.push_str(word);
    }
    lines.push(current);
}

/// Renders a titled list of text lines as a paginated PDF document.
pub fn render_text_pdf(title: &str, lines: &[String]) -> Vec<u8> {
    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![lines]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    // 1 catalog, 2 page tree, 3 font, then a page and its contents per page.
    let page_ids: Vec<usize> = (0..pages.len()).map(|index| 4 + 2 * index).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            page_ids
                .iter()
                .map(|id| format!("{id} 0 R"))
                .collect::<Vec<_>>()
                .join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (index, page_lines) in pages.iter().enumerate() {
        let content = page_content(if index == 0 { Some(title) } else { None }, page_lines);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_ids[index] + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{object}\nendobj\n", index + 1);
    }
    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    );
    out.into_bytes()
}

fn page_content(title: Option<&str>, lines: &[String]) -> String {
    let mut content = String::new();
    let _ = write!(
        content,
        "BT\n{LINE_HEIGHT} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    );
    if let Some(title) = title {
        let _ = write!(content, "/F1 16 Tf\n({}) Tj\nT* T*\n", escape(title));
    }
    content.push_str("/F1 11 Tf\n");
    for line in lines {
        let _ = writeln!(content, "({}) Tj T*", escape(line));
    }
    content.push_str("ET");
    content
}

/// Escapes a string for a PDF literal string.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' '..='~' => escaped.push(c),
            '\t' => escaped.push(' '),
            _ => escaped.push('?'),
        }
    }
    escaped
}
