use ratatui::prelude::*;
use std::sync::OnceLock;

// syntect setup (lazy)
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Render assistant-flavoured markdown to terminal lines.
/// Headers (#, ##, ###) come out bold, fenced code blocks are
/// syntax-highlighted, everything else is a plain paragraph line.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut in_code = false;
    let mut code_buf: Vec<String> = Vec::new();
    let mut code_lang: Option<String> = None;
    for raw in text.lines() {
        let trimmed = raw.trim_end_matches('\r');
        if trimmed.starts_with("```") {
            if in_code {
                let code_text = code_buf.join("\n");
                let mut hlines = highlight_code(&code_text, code_lang.as_deref());
                lines.append(&mut hlines);
                code_buf.clear();
                code_lang = None;
            } else {
                // opening fence can specify language: ```rust
                let lang = trimmed.trim_start_matches("```").trim();
                if !lang.is_empty() {
                    code_lang = Some(lang.to_string());
                }
            }
            in_code = !in_code;
            lines.push(Line::from(Span::styled(
                trimmed.to_string(),
                Style::default().fg(Color::DarkGray),
            )));
            continue;
        }
        if in_code {
            code_buf.push(trimmed.to_string());
            continue;
        }
        if trimmed.starts_with("### ") || trimmed.starts_with("## ") || trimmed.starts_with("# ")
        {
            lines.push(Line::from(Span::styled(
                trimmed.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
        } else {
            lines.push(Line::from(trimmed.to_string()));
        }
    }
    // A reply cut off inside a code block still renders what arrived
    if in_code && !code_buf.is_empty() {
        let code_text = code_buf.join("\n");
        let mut hlines = highlight_code(&code_text, code_lang.as_deref());
        lines.append(&mut hlines);
    }
    lines
}

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
static THEME: OnceLock<Theme> = OnceLock::new();

fn get_syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}
fn get_theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let ts = THEME_SET.get_or_init(ThemeSet::load_defaults);
        ts.themes
            .get("base16-ocean.dark")
            .cloned()
            .unwrap_or_else(|| ts.themes.values().next().cloned().unwrap_or_default())
    })
}

fn syn_to_tui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

fn highlight_code(code: &str, lang: Option<&str>) -> Vec<Line<'static>> {
    let ps = get_syntax_set();
    let theme = get_theme();
    let syn: &SyntaxReference = match lang {
        Some(l) if !l.is_empty() => ps
            .find_syntax_by_token(l)
            .unwrap_or_else(|| ps.find_syntax_plain_text()),
        _ => ps.find_syntax_plain_text(),
    };
    let mut high = HighlightLines::new(syn, theme);
    let mut out: Vec<Line<'static>> = Vec::new();
    for line in code.split('\n') {
        let regions: Vec<(SynStyle, &str)> = high.highlight_line(line, ps).unwrap_or_default();
        let mut spans: Vec<Span<'static>> = Vec::new();
        for (st, seg) in regions {
            let mut style = Style::default().fg(syn_to_tui_color(st.foreground));
            if st
                .font_style
                .contains(syntect::highlighting::FontStyle::BOLD)
            {
                style = style.add_modifier(Modifier::BOLD);
            }
            if st
                .font_style
                .contains(syntect::highlighting::FontStyle::ITALIC)
            {
                style = style.add_modifier(Modifier::ITALIC);
            }
            spans.push(Span::styled(seg.to_string(), style));
        }
        out.push(Line::from(spans));
    }
    out
}
