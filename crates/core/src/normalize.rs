//! Deterministic text normalization (spec §4.1).
//!
//! Applied symmetrically to stored authority labels (producing the persisted
//! `norm_label` column) and to incoming mention text before the trigram
//! channel matches against it. Total, side-effect free, never fails.

use unicode_normalization::UnicodeNormalization;

/// Normalize `text`: trim, collapse internal whitespace to single spaces,
/// lowercase (locale-independent), and fold accents by canonical
/// decomposition followed by removal of combining marks.
///
/// Empty input returns the empty string. This function is total: there is
/// no input for which it panics or returns an error.
#[must_use]
pub fn normalize(text: &str) -> String {
    let collapsed = collapse_whitespace(text.trim());
    let lowered = collapsed.to_lowercase();
    fold_accents(&lowered)
}

/// Collapse any run of Unicode whitespace to a single ASCII space.
fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
            }
            prev_was_space = true;
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

/// Decompose to NFD and drop combining marks (category Mn), so that e.g.
/// `"café"` and `"cafe"` normalize identically. Special-cased letters that
/// don't decompose to a base+mark pair under NFD (`ß`, `æ`, `ø`, `œ`, ...)
/// are mapped explicitly to keep parity with the stored `norm_label` column.
fn fold_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfd() {
        if let Some(replacement) = fold_special_case(ch) {
            out.push_str(replacement);
            continue;
        }
        if is_combining_mark(ch) {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Letters NFD does not decompose into base + combining mark, but which the
/// authority database's stored `norm_label` folds anyway.
fn fold_special_case(ch: char) -> Option<&'static str> {
    match ch {
        'ß' => Some("ss"),
        'æ' | 'Æ' => Some("ae"),
        'œ' | 'Œ' => Some("oe"),
        'ø' | 'Ø' => Some("o"),
        'đ' | 'Đ' => Some("d"),
        'ł' | 'Ł' => Some("l"),
        _ => None,
    }
}

fn is_combining_mark(ch: char) -> bool {
    matches!(ch as u32,
        0x0300..=0x036F | // Combining Diacritical Marks
        0x1AB0..=0x1AFF | // Combining Diacritical Marks Extended
        0x1DC0..=0x1DFF | // Combining Diacritical Marks Supplement
        0x20D0..=0x20FF   // Combining Diacritical Marks for Symbols
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_trims() {
        assert_eq!(normalize("  Stockholm  "), "stockholm");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize("Acer   platanoides\tL."), "acer platanoides l.");
    }

    #[test]
    fn folds_accents() {
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("Ångström"), "angstrom");
        assert_eq!(normalize("Straße"), "strasse");
        assert_eq!(normalize("Øresund"), "oresund");
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn round_trips_already_normalized_labels() {
        // Testable property 4: normalize(norm_label) == norm_label.
        let already_normalized = ["stockholm", "acer platanoides l.", "quercus robur"];
        for label in already_normalized {
            assert_eq!(normalize(label), label);
        }
    }

    #[test]
    fn is_deterministic() {
        let input = "Île-de-France";
        assert_eq!(normalize(input), normalize(input));
    }
}
