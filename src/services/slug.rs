//! URL slugs for news articles and policies

/// Slug used when a title has no usable characters
pub const FALLBACK_SLUG: &str = "untitled";

/// Turn a title into a URL slug.
///
/// Lowercases, drops everything except ASCII letters, digits, whitespace,
/// `-` and `_`, then joins the words with single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// `base` if no existing slug uses it, otherwise the first free `base-N`.
pub fn generate_unique_slug<S: AsRef<str>>(base: &str, existing: &[S]) -> String {
    let taken = |candidate: &str| existing.iter().any(|s| s.as_ref() == candidate);

    if !taken(base) {
        return base.to_string();
    }

    let mut counter = 1u32;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
