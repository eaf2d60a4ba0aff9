use regex::Regex;
use std::sync::LazyLock;

pub const TAG_MAX_LEN: usize = 64;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w])#(\w+)").expect("hashtag pattern is valid"));

/// Hashtags in `text`, lowercased and deduplicated in order of appearance.
///
/// A tag starts at a `#` that is not preceded by a word character and runs
/// over word characters.
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    for tag in HASHTAG.captures_iter(text).filter_map(|captures| captures.get(1)) {
        let tag = tag.as_str();
        if tag.chars().count() > TAG_MAX_LEN {
            continue;
        }

        let tag = tag.to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}

/// The stored form of a tag typed by a user: no leading `#`, lowercase.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

#[cfg(test)]
mod tests {
    use crate::tags::{extract_tags, normalize_tag};

    #[test]
    fn finds_tags() {
        assert_eq!(extract_tags("hello #world"), ["world"]);
        assert_eq!(
            extract_tags("#Rust and #rust, #async_await!"),
            ["rust", "async_await"]
        );
        assert_eq!(extract_tags("#привіт світ"), ["привіт"]);
    }

    #[test]
    fn ignores_non_tags() {
        assert!(extract_tags("no tags here").is_empty());
        assert!(extract_tags("lonely # sign").is_empty());
        assert!(extract_tags("mail me at a#b").is_empty());
        assert_eq!(extract_tags("##double"), ["double"]);
    }

    #[test]
    fn adjacent_and_long_tags() {
        assert_eq!(extract_tags("#a#b ##c"), ["a", "c"]);
        assert_eq!(extract_tags("(#paren) #end"), ["paren", "end"]);
        assert!(extract_tags(&format!("#{}", "x".repeat(65))).is_empty());
    }

    #[test]
    fn normalizes_typed_tags() {
        assert_eq!(normalize_tag("#World"), "world");
        assert_eq!(normalize_tag(" rust "), "rust");
        assert_eq!(normalize_tag("##Rust"), "rust");
    }
}
