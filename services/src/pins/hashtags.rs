//! Hashtag text normalisation.

/// Trims whitespace and strips a single leading `#`.
/// Returns `None` when nothing is left.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let tag = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_owned())
    }
}

/// Normalises every tag, dropping empties and duplicates while keeping the
/// first occurrence order.
pub fn normalize_tags<I, T>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().filter_map(|t| normalize_tag(t.as_ref())) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
