//! Slug helpers
//!
//! A slug is the lowercase, hyphenated key used for items and categories.
//! Catalog matching always compares slugs, so `"Tech Giants"`,
//! `"tech-giants"` and `"TECH-GIANTS"` name the same category.

const PLACEHOLDER_IMAGE_BASE: &str = "https://via.placeholder.com/256x256/4F46E5/FFFFFF?text=";

/// Convert free text into a slug
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Slug-based, case-insensitive name comparison
pub fn slug_matches(a: &str, b: &str) -> bool {
    slugify(a) == slugify(b)
}

/// Human-readable name derived from a slug ("unobtainium-widget" -> "Unobtainium Widget")
pub fn title_case(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Deterministic placeholder image for an item without one
pub fn placeholder_image_url(slug: &str) -> String {
    format!("{}{}", PLACEHOLDER_IMAGE_BASE, slugify(slug).to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Tech Giants"), "tech-giants");
        assert_eq!(slugify("  TECH--giants "), "tech-giants");
        assert_eq!(slugify("Pokémon Cards!"), "pokémon-cards");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_slug_matches_ignores_case_and_separators() {
        assert!(slug_matches("Crypto", "crypto"));
        assert!(slug_matches("tech giants", "TECH-GIANTS"));
        assert!(!slug_matches("crypto", "cryptos"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("unobtainium-widget-9000"), "Unobtainium Widget 9000");
        assert_eq!(title_case("bitcoin"), "Bitcoin");
    }

    #[test]
    fn test_placeholder_image_url() {
        assert_eq!(
            placeholder_image_url("rolex submariner"),
            "https://via.placeholder.com/256x256/4F46E5/FFFFFF?text=ROLEX-SUBMARINER"
        );
    }
}
