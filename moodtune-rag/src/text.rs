//! String normalization for matching and id derivation

/// Normalize a string for matching: lowercase, keep alphanumeric chars and spaces, strip other characters.
pub fn normalize_for_matching(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace tokens of the normalized form
pub fn tokens(input: &str) -> Vec<String> {
    normalize_for_matching(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when every token of `query` appears as a token of `field` (AND semantics)
///
/// An empty query matches nothing.
pub fn matches_all_tokens(field: &str, query: &str) -> bool {
    let query_tokens = tokens(query);
    if query_tokens.is_empty() {
        return false;
    }
    let field_tokens = tokens(field);
    query_tokens.iter().all(|q| field_tokens.contains(q))
}

/// ASCII slug: lowercase alphanumerics, any other run collapsed to a single `-`
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_matching() {
        assert_eq!(normalize_for_matching("  Don't Stop   Me Now! "), "don t stop me now");
        assert_eq!(normalize_for_matching("AC/DC"), "ac dc");
    }

    #[test]
    fn test_matches_all_tokens() {
        assert!(matches_all_tokens("Bohemian Rhapsody (Remastered 2011)", "bohemian rhapsody"));
        assert!(matches_all_tokens("Queen", "QUEEN"));
        assert!(!matches_all_tokens("Bohemian Rhapsody", "bohemian like you"));
        assert!(!matches_all_tokens("Anything", "  "));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Song"), "song");
        assert_eq!(slugify("  Hello, World!! "), "hello-world");
        assert_eq!(slugify("Beyoncé & Jay-Z"), "beyonc-jay-z");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
