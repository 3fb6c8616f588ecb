//! Text helpers shared by services and templates.

/// Slug length limits per record type.
pub const POST_SLUG_MAX: usize = 200;
pub const CATEGORY_SLUG_MAX: usize = 100;
pub const TAG_SLUG_MAX: usize = 50;

const EXCERPT_LEN: usize = 160;
const WORDS_PER_MINUTE: f64 = 225.0;

/// Replace `& < > " '` with named entities. Everything else is kept.
///
/// Escaping twice escapes the ampersands of the first pass again.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Lowercase ASCII slug: runs of whitespace or `_` become one `-`,
/// anything outside `[a-z0-9-]` is dropped.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            if pending_dash {
                out.push('-');
                pending_dash = false;
            }
            out.push(c);
        } else if c.is_whitespace() || c == '_' {
            pending_dash = true;
        }
    }

    let trimmed = out.trim_matches('-');
    let cut = &trimmed[..trimmed.len().min(max_len)];
    cut.trim_end_matches('-').to_string()
}

/// `base`, or `base-2`, `base-3`, ... whichever `taken` refuses first.
pub fn unique_slug<F>(base: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Drop everything between `<` and `>`.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain text summary of at most 160 characters, cut on a word boundary.
pub fn excerpt(text: &str) -> String {
    excerpt_with_len(text, EXCERPT_LEN)
}

pub fn excerpt_with_len(text: &str, len: usize) -> String {
    let plain = collapse_whitespace(&strip_tags(text));
    if plain.chars().count() <= len {
        return plain;
    }

    let cut: String = plain.chars().take(len).collect();
    let cut = match cut.rfind(' ') {
        Some(i) if i > 0 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}

pub fn word_count(text: &str) -> usize {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .count()
}

/// Minutes to read `content`; never below one unless there is no content.
pub fn reading_time(content: &str) -> u32 {
    if content.is_empty() {
        return 0;
    }
    let minutes = (word_count(&strip_tags(content)) as f64 / WORDS_PER_MINUTE).round() as u32;
    minutes.max(1)
}

/// Remove `<script>` and `<style>` blocks, `on*` event attributes and
/// `javascript:` links from trusted-ish HTML before it is rendered raw.
pub fn sanitize_html(html: &str) -> String {
    let without_blocks = strip_blocks(html, &["script", "style"]);
    strip_unsafe_attributes(&without_blocks)
}

fn find_open_tag(lower: &str, open: &str) -> Option<usize> {
    let mut at = 0;
    while let Some(rel) = lower[at..].find(open) {
        let start = at + rel;
        match lower.as_bytes().get(start + open.len()) {
            None | Some(b'>') | Some(b'/') => return Some(start),
            Some(b) if b.is_ascii_whitespace() => return Some(start),
            _ => at = start + open.len(),
        }
    }
    None
}

fn strip_blocks(html: &str, tags: &[&str]) -> String {
    let mut out = html.to_string();
    for tag in tags {
        let open = format!("<{tag}");
        let close = format!("</{tag}");
        loop {
            // ASCII lowercasing keeps byte offsets aligned with `out`.
            let lower = out.to_ascii_lowercase();
            let Some(start) = find_open_tag(&lower, &open) else {
                break;
            };
            let end = match lower[start..].find(&close) {
                Some(rel) => {
                    let close_at = start + rel;
                    lower[close_at..]
                        .find('>')
                        .map_or(out.len(), |i| close_at + i + 1)
                }
                None => out.len(),
            };
            out.replace_range(start..end, "");
        }
    }
    out
}

fn strip_unsafe_attributes(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let tail = &rest[lt..];
        match tail.find('>') {
            Some(gt) => {
                out.push_str(&clean_tag(&tail[1..gt]));
                rest = &tail[gt + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") {
        return true;
    }
    if matches!(name.as_str(), "href" | "src" | "action" | "formaction") {
        let v = value
            .trim_start_matches(|c: char| c == '=' || c.is_whitespace() || c == '"' || c == '\'')
            .to_ascii_lowercase();
        return v.trim_start().starts_with("javascript:");
    }
    false
}

/// Rebuild `<inner>` without unsafe attributes, keeping the rest verbatim.
fn clean_tag(inner: &str) -> String {
    let chars: Vec<char> = inner.chars().collect();
    let mut out = String::from("<");
    let mut i = 0;

    while i < chars.len() && !chars[i].is_whitespace() {
        out.push(chars[i]);
        i += 1;
    }

    while i < chars.len() {
        let ws_start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let ws: String = chars[ws_start..i].iter().collect();

        let name_start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '=' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect();

        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        let mut value = String::new();
        if j < chars.len() && chars[j] == '=' {
            j += 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '"' || chars[j] == '\'') {
                let quote = chars[j];
                j += 1;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                j = (j + 1).min(chars.len());
            } else {
                while j < chars.len() && !chars[j].is_whitespace() {
                    j += 1;
                }
            }
            value = chars[i..j].iter().collect();
            i = j;
        }

        if name.is_empty() && value.is_empty() {
            out.push_str(&ws);
            continue;
        }
        if is_unsafe_attribute(&name, &value) {
            continue;
        }
        out.push_str(&ws);
        out.push_str(&name);
        out.push_str(&value);
    }

    out.push('>');
    out
}
