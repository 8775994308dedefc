const MAX_SLUG_LEN: usize = 80;

/// URL slug from a title: lower-case ASCII words joined by single hyphens
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        let c = match c {
            'ä' | 'Ä' => Some("ae"),
            'ö' | 'Ö' => Some("oe"),
            'ü' | 'Ü' => Some("ue"),
            'ß' => Some("ss"),
            _ => None,
        }
        .map(str::to_string)
        .or_else(|| c.is_ascii_alphanumeric().then(|| c.to_ascii_lowercase().to_string()));

        match c {
            Some(part) => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push_str(&part);
            }
            None => pending_hyphen = true,
        }

        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Accept a caller-supplied slug only if it is already in canonical form
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("How do I report a profile?"), "how-do-i-report-a-profile");
        assert_eq!(slugify("  Safety -- first!  "), "safety-first");
        assert_eq!(slugify("Grüße aus Köln"), "gruesse-aus-koeln");
    }

    #[test]
    fn test_slug_length_capped() {
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("dating-tips-2026"));
        assert!(!is_valid_slug("Dating Tips"));
        assert!(!is_valid_slug(""));
    }
}
