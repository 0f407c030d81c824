use crate::config::RenderSection;
use crate::sentinels::{strip_highlight_markers, HIGHLIGHT_PAIR_RE, MAPPED_CLASS};

/// `<ul class="mapped-bullets">` with one `<li>` per bullet. Bullet text is escaped; each
/// `{{HIGHLIGHT}}…{{/HIGHLIGHT}}` pair becomes a highlight span, unpaired markers are dropped.
pub fn render_list(bullets: &[&str], render: &RenderSection) -> String {
    let mut out = String::new();
    list_into(&mut out, bullets, render, true);
    out
}

/// The list wrapped in a block-level `<div>` for insertion between text blocks. Only the
/// wrapper carries the marker class.
pub fn render_block(bullets: &[&str], render: &RenderSection) -> String {
    let mut out = String::new();
    out.push_str("<div class=\"");
    out.push_str(MAPPED_CLASS);
    out.push_str("\" style=\"");
    escape_attr_into(&mut out, &render.wrapper_style);
    out.push_str("\">");
    list_into(&mut out, bullets, render, false);
    out.push_str("</div>");
    out
}

fn list_into(out: &mut String, bullets: &[&str], render: &RenderSection, marked: bool) {
    out.push_str("<ul ");
    if marked {
        out.push_str("class=\"");
        out.push_str(MAPPED_CLASS);
        out.push_str("\" ");
    }
    out.push_str("style=\"");
    escape_attr_into(out, &render.list_style);
    out.push_str("\">");
    for bullet in bullets {
        out.push_str("<li style=\"");
        escape_attr_into(out, &render.item_style);
        out.push_str("\">");
        render_bullet_into(out, bullet, &render.highlight_style);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

/// A `<h3>` heading followed by the list, for content appended outside any section.
pub fn render_appended_section(name: &str, bullets: &[&str], render: &RenderSection) -> String {
    let mut out = String::new();
    out.push_str("<h3 style=\"");
    escape_attr_into(&mut out, &render.appended_heading_style);
    out.push_str("\">");
    escape_text_into(&mut out, name);
    out.push_str("</h3>");
    out.push_str(&render_list(bullets, render));
    out
}

fn render_bullet_into(out: &mut String, bullet: &str, highlight_style: &str) {
    let mut pos = 0usize;
    for caps in HIGHLIGHT_PAIR_RE.captures_iter(bullet) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        escape_text_into(out, &strip_highlight_markers(&bullet[pos..whole.start()]));
        out.push_str("<span style=\"");
        escape_attr_into(out, highlight_style);
        out.push_str("\">");
        escape_text_into(out, &strip_highlight_markers(inner.as_str()));
        out.push_str("</span>");
        pos = whole.end();
    }
    escape_text_into(out, &strip_highlight_markers(&bullet[pos..]));
}

fn escape_text_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
}
