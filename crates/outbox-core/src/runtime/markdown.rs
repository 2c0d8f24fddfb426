// crates/outbox-core/src/runtime/markdown.rs
// ============================================================================
// Module: Markdown Rendering
// Description: Minimal Markdown-to-HTML conversion for rich-text fields.
// Purpose: Render agent-authored descriptions and acceptance criteria.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Supports the subset agents are instructed to write: `#` to `######`
//! headings, `- ` / `* ` bullet runs, and paragraphs. Everything else is
//! treated as paragraph text. All text is HTML-escaped.

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a Markdown description into HTML.
#[must_use]
pub fn render_markdown(text: &str) -> String {
    let mut html = String::new();
    let mut list: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(item) = bullet(trimmed) {
            list.push(item.to_string());
            continue;
        }
        flush_list(&mut html, &mut list);
        if trimmed.is_empty() {
            continue;
        }
        if let Some((level, heading)) = heading(trimmed) {
            html.push_str(&format!("<h{level}>{}</h{level}>", escape_html(heading)));
        } else {
            html.push_str(&format!("<p>{}</p>", escape_html(trimmed)));
        }
    }
    flush_list(&mut html, &mut list);
    html
}

/// Renders acceptance criteria as an HTML list, skipping blank entries.
///
/// Returns `None` when no criterion has text.
#[must_use]
pub fn render_criteria(criteria: &[String]) -> Option<String> {
    let items: Vec<String> = criteria
        .iter()
        .map(|criterion| criterion.trim())
        .filter(|criterion| !criterion.is_empty())
        .map(|criterion| format!("<li>{}</li>", escape_html(criterion)))
        .collect();
    if items.is_empty() {
        return None;
    }
    Some(format!("<ul>{}</ul>", items.concat()))
}

/// Escapes the HTML metacharacters.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Returns the text of a bullet line.
fn bullet(line: &str) -> Option<&str> {
    line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")).map(str::trim)
}

/// Returns the level and text of a heading line.
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|ch| *ch == '#').count();
    if !(1 ..= 6).contains(&level) {
        return None;
    }
    line[level ..].strip_prefix(' ').map(|text| (level, text.trim()))
}

/// Appends any pending bullet run as one list.
fn flush_list(html: &mut String, list: &mut Vec<String>) {
    if list.is_empty() {
        return;
    }
    html.push_str("<ul>");
    for item in list.drain(..) {
        html.push_str(&format!("<li>{}</li>", escape_html(&item)));
    }
    html.push_str("</ul>");
}

// ============================================================================
// SECTION: Tests
// ============================================================================
