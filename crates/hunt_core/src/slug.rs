//! Play slugs: the public, unguessable handle players use to reach a hunt's
//! live version.

const MAX_STEM_LEN: usize = 40;

/// `<name-stem>-<10 hex chars>`, e.g. `riverside-walk-3f9a0c1b2d`.
pub fn generate_play_slug(name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..10];
    let stem = slug_stem(name);
    if stem.is_empty() {
        format!("hunt-{suffix}")
    } else {
        format!("{stem}-{suffix}")
    }
}

fn slug_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len().min(MAX_STEM_LEN));
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !stem.is_empty() {
                stem.push('-');
            }
            pending_dash = false;
            stem.push(c.to_ascii_lowercase());
            if stem.len() >= MAX_STEM_LEN {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_collapses_punctuation() {
        assert_eq!(slug_stem("  Riverside Walk!! (2024) "), "riverside-walk-2024");
    }

    #[test]
    fn non_ascii_name_falls_back_to_hunt() {
        let slug = generate_play_slug("ÜÖÄ");
        assert!(slug.starts_with("hunt-"));
        assert_eq!(slug.len(), "hunt-".len() + 10);
    }

    #[test]
    fn slugs_are_unique() {
        assert_ne!(generate_play_slug("Park"), generate_play_slug("Park"));
    }
}
