//! Derived rendering of chord notation
//!
//! Rendering is best-effort: the version store attaches the output when it
//! succeeds and logs the failure otherwise. The rendered HTML is cached on
//! the version row and treated as opaque everywhere else.

use crate::{Error, Result};

/// Label extensions that mark a version as ChordPro source
const CHORDPRO_EXTENSIONS: [&str; 4] = [".cho", ".chopro", ".chordpro", ".crd"];

/// Directives whose presence marks content as ChordPro
const CHORDPRO_MARKERS: [&str; 6] = ["{title:", "{t:", "{subtitle:", "{soc}", "{start_of_chorus", "{comment:"];

/// Converts version content into its cached rendered form
pub trait ContentRenderer: Send + Sync {
    fn render(&self, content: &str) -> Result<String>;
}

/// Whether the label/content signature indicates renderable chord notation
pub fn is_renderable(label: &str, content: Option<&str>) -> bool {
    let label = label.trim().to_ascii_lowercase();
    if CHORDPRO_EXTENSIONS.iter().any(|ext| label.ends_with(ext)) {
        return true;
    }

    content
        .map(|c| {
            let lower = c.to_ascii_lowercase();
            CHORDPRO_MARKERS.iter().any(|m| lower.contains(m))
        })
        .unwrap_or(false)
}

/// Minimal ChordPro to HTML renderer
///
/// Supports `[Chord]` annotations inside lyric lines and the `title`,
/// `subtitle`, `comment` and chorus directives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChordProRenderer;

impl ContentRenderer for ChordProRenderer {
    fn render(&self, content: &str) -> Result<String> {
        let mut html = String::new();
        let mut in_chorus = false;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim_end();
            let line_no = index + 1;

            if line.trim_start().starts_with('{') {
                let directive = line.trim();
                let body = directive
                    .strip_prefix('{')
                    .and_then(|d| d.strip_suffix('}'))
                    .ok_or_else(|| {
                        Error::Dependency(format!("line {}: unterminated directive", line_no))
                    })?;

                let (name, value) = match body.split_once(':') {
                    Some((name, value)) => (name.trim().to_ascii_lowercase(), value.trim()),
                    None => (body.trim().to_ascii_lowercase(), ""),
                };

                match name.as_str() {
                    "title" | "t" => html.push_str(&format!("<h1>{}</h1>\n", escape(value))),
                    "subtitle" | "st" => html.push_str(&format!("<h2>{}</h2>\n", escape(value))),
                    "comment" | "c" => {
                        html.push_str(&format!("<p class=\"comment\">{}</p>\n", escape(value)))
                    }
                    "start_of_chorus" | "soc" => {
                        if !in_chorus {
                            html.push_str("<div class=\"chorus\">\n");
                            in_chorus = true;
                        }
                    }
                    "end_of_chorus" | "eoc" => {
                        if in_chorus {
                            html.push_str("</div>\n");
                            in_chorus = false;
                        }
                    }
                    // Unknown directives are dropped
                    _ => {}
                }
                continue;
            }

            html.push_str(&render_lyric_line(line, line_no)?);
        }

        if in_chorus {
            html.push_str("</div>\n");
        }

        Ok(html)
    }
}

fn render_lyric_line(line: &str, line_no: usize) -> Result<String> {
    if line.trim().is_empty() {
        return Ok("<div class=\"line empty\"></div>\n".to_string());
    }

    let mut out = String::from("<div class=\"line\">");
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        out.push_str(&escape(&rest[..open]));
        let after = &rest[open + 1..];
        let close = after.find(']').ok_or_else(|| {
            Error::Dependency(format!("line {}: unterminated chord bracket", line_no))
        })?;
        out.push_str(&format!(
            "<span class=\"chord\">{}</span>",
            escape(&after[..close])
        ));
        rest = &after[close + 1..];
    }
    out.push_str(&escape(rest));
    out.push_str("</div>\n");

    Ok(out)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
