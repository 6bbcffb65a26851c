use std::io;
use std::path::Path;

pub const MAX_FILENAME_BYTES: usize = 255;
pub const PLACEHOLDER_FILENAME: &str = "unknown_filename";

/// Pull a filename out of a `Content-Disposition` value.
///
/// The extended `filename*=charset'lang'value` form wins over the plain
/// `filename=` form when both are present.
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    let params = split_params(value);

    let extended = params.iter().find_map(|p| strip_param(p, "filename*="));
    if let Some(raw) = extended {
        let raw = raw.trim_matches('"');
        // charset'language'percent-encoded
        let encoded = raw.splitn(3, '\'').nth(2).unwrap_or(raw);
        let decoded = urlencoding::decode(encoded)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| encoded.to_string());
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }

    params
        .iter()
        .find_map(|p| strip_param(p, "filename="))
        .map(|raw| raw.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// Split on `;` except inside double quotes, so `filename="a;b.pdf"` stays whole.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (idx, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(value[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn strip_param<'a>(param: &'a str, key: &str) -> Option<&'a str> {
    let head = param.get(..key.len())?;
    if head.eq_ignore_ascii_case(key) {
        Some(&param[key.len()..])
    } else {
        None
    }
}

/// Pick the on-disk name: header, then declared name, then the placeholder.
/// The result is a single path component no longer than [`MAX_FILENAME_BYTES`].
pub fn choose_filename(content_disposition: Option<&str>, declared: Option<&str>) -> String {
    let picked = content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| declared.filter(|d| !d.is_empty()).map(String::from))
        .unwrap_or_else(|| PLACEHOLDER_FILENAME.to_string());

    let cleaned: String = picked
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        return PLACEHOLDER_FILENAME.to_string();
    }
    truncate_filename(&cleaned, MAX_FILENAME_BYTES)
}

/// Split at the last dot, ignoring leading dots (`.bashrc` has no extension).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

pub(crate) fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Shorten `name` to at most `max` bytes, cutting only the base name so the
/// extension survives.
pub fn truncate_filename(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let (base, ext) = split_extension(name);
    if ext.len() >= max {
        return name[..floor_char_boundary(name, max)].to_string();
    }
    let keep = floor_char_boundary(base, max - ext.len());
    format!("{}{ext}", &base[..keep])
}

/// First of `name`, `base_1.ext`, `base_2.ext`, ... that does not exist in `folder`.
pub async fn unique_filename(name: &str, folder: &Path) -> io::Result<String> {
    if !tokio::fs::try_exists(folder.join(name)).await? {
        return Ok(name.to_string());
    }

    let (base, ext) = split_extension(name);
    let mut counter = 1u32;
    loop {
        let suffix = format!("_{counter}");
        let budget = MAX_FILENAME_BYTES.saturating_sub(ext.len() + suffix.len());
        let candidate = format!("{}{suffix}{ext}", &base[..floor_char_boundary(base, budget)]);
        if !tokio::fs::try_exists(folder.join(&candidate)).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}
