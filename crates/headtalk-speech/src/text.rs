//! Text preprocessing for speech requests.
//!
//! Normalizes incoming text before any state transition and splits it into
//! sentence fragments so progress signals can be resolved to the piece of
//! text currently being spoken (subtitles / lip-sync).

/// A sentence-sized piece of the utterance text with its character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Character offset of the fragment start within the normalized text.
    pub offset: usize,

    /// The fragment text.
    pub text: String,
}

/// Normalize text for speaking: trim and collapse whitespace runs.
///
/// Returns `None` for empty or whitespace-only input — the caller rejects
/// the request before creating an utterance.
#[must_use]
pub fn normalize(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Split normalized text into sentence fragments with character offsets.
///
/// Boundaries are `.`, `!`, `?` followed by whitespace or end-of-string.
/// Text without any boundary yields a single fragment covering everything.
#[must_use]
pub fn fragments(text: &str) -> Vec<Fragment> {
    let mut result = Vec::new();
    let mut start = 0usize;
    let chars: Vec<char> = text.chars().collect();

    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.get(i + 1).is_none_or(|next| next.is_whitespace());

        if at_boundary {
            let piece: String = chars[start..=i].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                result.push(Fragment {
                    offset: start,
                    text: piece.to_string(),
                });
            }
            // Skip the whitespace after the boundary.
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }

    if start < chars.len() {
        let piece: String = chars[start..].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            result.push(Fragment {
                offset: start,
                text: piece.to_string(),
            });
        }
    }

    result
}

/// Index of the fragment containing the given character position, i.e. the
/// last fragment whose offset is `<= char_index`.
#[must_use]
pub fn fragment_at(fragments: &[Fragment], char_index: usize) -> Option<usize> {
    fragments
        .iter()
        .rposition(|fragment| fragment.offset <= char_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_collapses() {
        assert_eq!(normalize("  hello   world \n"), Some("hello world".into()));
    }

    #[test]
    fn normalize_rejects_whitespace_only() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   \t\n "), None);
    }

    #[test]
    fn single_sentence_is_one_fragment() {
        let frags = fragments("Hello there");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].offset, 0);
        assert_eq!(frags[0].text, "Hello there");
    }

    #[test]
    fn splits_at_sentence_boundaries() {
        let frags = fragments("One. Two! Three?");
        let texts: Vec<_> = frags.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["One.", "Two!", "Three?"]);
        assert_eq!(frags[0].offset, 0);
        assert_eq!(frags[1].offset, 5);
        assert_eq!(frags[2].offset, 10);
    }

    #[test]
    fn abbreviation_dot_without_space_does_not_split() {
        let frags = fragments("v1.2 is out. Enjoy");
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].text, "v1.2 is out.");
    }

    #[test]
    fn fragment_at_picks_containing_fragment() {
        let frags = fragments("One. Two! Three?");
        assert_eq!(fragment_at(&frags, 0), Some(0));
        assert_eq!(fragment_at(&frags, 4), Some(0));
        assert_eq!(fragment_at(&frags, 7), Some(1));
        assert_eq!(fragment_at(&frags, 99), Some(2));
    }

    #[test]
    fn fragment_at_empty_is_none() {
        assert_eq!(fragment_at(&[], 3), None);
    }
}
