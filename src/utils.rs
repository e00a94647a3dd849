/// Lower-cases `name` and folds spaces and hyphens into `separator`, collapsing
/// runs and trimming them from both ends. `"One Piece"`, `"one-piece"` and
/// `" ONE  piece "` all become `one_piece`.
pub fn normalize_series_name(name: &str, separator: char) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c == ' ' || c == '-' || c == separator {
            pending_separator = true;
            continue;
        }
        if pending_separator && !normalized.is_empty() {
            normalized.push(separator);
        }
        pending_separator = false;
        normalized.push(c);
    }

    normalized
}

/// Image file extension taken from the last path segment of `url`, ignoring
/// any query or fragment. Falls back to `jpg`.
pub fn image_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => "jpg".to_string(),
    }
}

/// Collapses inner whitespace of scraped text.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
