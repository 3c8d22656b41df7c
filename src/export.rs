//! Transcript export.
//!
//! Renders the ordered message sequence (plus the optional document
//! context) into a self-contained HTML transcript the host can print or
//! share. Producing the final PDF artifact is the platform's job.

use time::format_description::well_known::Rfc3339;

use crate::types::{DocumentContext, Message, Sender};

/// Render a shareable HTML transcript.
pub fn render_transcript(messages: &[Message], document: Option<&DocumentContext>) -> String {
    let doc_box = document
        .map(|doc| {
            format!(
                r#"<div class="doc-box"><div class="doc-title">📄 Document: {}</div><div class="doc-meta">Uploaded: {}</div></div>"#,
                escape_html(&doc.file_name),
                format_time(&doc.uploaded_at),
            )
        })
        .unwrap_or_default();

    let bubbles: Vec<String> = messages.iter().map(render_message).collect();

    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\" /><title>BizAssist Chat Transcript</title></head>\n\
         <body>\n<header class=\"top\"><h1>BizAssist Chat Transcript</h1></header>\n{}\n<div class=\"chat\">\n{}\n</div>\n</body>\n</html>\n",
        doc_box,
        bubbles.join("\n"),
    )
}

fn render_message(message: &Message) -> String {
    let (who, sender) = match message.sender {
        Sender::User => ("user", "You"),
        Sender::Assistant => ("bot", "BizAssist"),
        Sender::System => ("system", "System"),
    };
    format!(
        r#"<div class="message {who}"><div class="bubble"><div class="bubble-content">{}</div><div class="meta"><span class="sender">{sender}</span> <span class="time">{}</span></div></div></div>"#,
        markup_to_html(&message.text),
        format_time(&message.created_at),
    )
}

fn format_time(at: &time::OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

pub fn escape_html(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Convert the lightweight chat markup (fenced code, inline code, bold,
/// italic) to HTML, escaping everything else.
pub fn markup_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Fenced code blocks first, so their contents escape inline passes.
    let mut out = String::new();
    let mut rest = escape_html(text);
    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        if let Some(end) = after.find("```") {
            out.push_str(&render_inline(&rest[..start]));
            out.push_str("<pre class=\"code-block\"><code>");
            out.push_str(&after[..end]);
            out.push_str("</code></pre>");
            rest = after[end + 3..].to_string();
        } else {
            break;
        }
    }
    out.push_str(&render_inline(&rest));
    format!("<p>{}</p>", out)
}

fn render_inline(text: &str) -> String {
    let mut out = replace_pairs(text, "`", "<code class='inline-code'>", "</code>");
    out = replace_pairs(&out, "**", "<strong>", "</strong>");
    out = replace_pairs(&out, "__", "<strong>", "</strong>");
    out = replace_pairs(&out, "*", "<em>", "</em>");
    out = replace_pairs(&out, "_", "<em>", "</em>");
    out = out.replace("\n\n", "</p><p>");
    out.replace('\n', "<br>")
}

/// Replace balanced pairs of `delim` with open/close tags. An unmatched
/// trailing delimiter is left as-is.
fn replace_pairs(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = rest.find(delim) else {
            out.push_str(rest);
            return out;
        };
        let after = &rest[start + delim.len()..];
        let Some(end) = after.find(delim) else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        out.push_str(open);
        out.push_str(&after[..end]);
        out.push_str(close);
        rest = &after[end + delim.len()..];
    }
}
