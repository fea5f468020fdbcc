//! Label computation for LaTeX cross references
//!
//! Labels are derived, never taken verbatim from the user. Every function here
//! is pure so the same location always maps to the same label, no matter in
//! which order notes are visited.

/// Path used when a location has no header path
pub const STATEMENT: &str = "statement";

/// Reserved header anchor that designates a proof
pub const PROOF: &str = "proof";

/// Lowercase, trim, strip commas and turn whitespace into underscores.
pub fn canonicalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != ',')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Reduce a link target to the note name it designates.
///
/// Folders and a trailing `.md` are dropped, so `notes/Lemma A.md` and
/// `Lemma A` address the same note.
pub fn note_address(address: &str) -> &str {
    let name = address.trim().rsplit('/').next().unwrap_or("");
    let extension = name
        .len()
        .checked_sub(3)
        .and_then(|cut| name.get(cut..).map(|ext| (cut, ext)));
    match extension {
        Some((cut, ext)) if ext.eq_ignore_ascii_case(".md") => &name[..cut],
        _ => name,
    }
}

/// Whether two addresses designate the same note
pub fn same_note(a: &str, b: &str) -> bool {
    canonicalize(note_address(a)) == canonicalize(note_address(b))
}

/// Join header titles into a dotted header path.
pub fn header_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| canonicalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Turn a `#`-separated header anchor (`Setup#Intro`) into a header path.
pub fn anchor_path(anchor: &str) -> String {
    let segments: Vec<&str> = anchor.split('#').collect();
    header_path(&segments)
}

/// Label of a location in the note graph.
///
/// `address` is empty for the root note, which yields `sec:` labels; any
/// other note yields `res:<address>.` labels. An empty header path stands for
/// the note's main statement.
pub fn label_from_location(address: &str, header_path: &str) -> String {
    let path = if header_path.trim().is_empty() {
        STATEMENT
    } else {
        header_path
    };
    let address = note_address(address);
    if address.is_empty() {
        canonicalize(&format!("sec:{}", path))
    } else {
        canonicalize(&format!("res:{}.{}", address, path))
    }
}

/// Resolve a user supplied `kind-rest` label.
///
/// Inside the root note the first `-` becomes `:`. Inside any other note the
/// note's address is inserted so that equal labels in different notes stay
/// distinct: `lem-main` in note `B` becomes `lem:b.main`.
pub fn explicit_label(label: &str, note: &str, root: &str) -> String {
    let label = label.trim();
    let in_root = note.is_empty() || same_note(note, root);
    let address = note_address(note);
    match label.split_once('-') {
        Some((kind, rest)) if in_root => canonicalize(&format!("{}:{}", kind, rest)),
        Some((kind, rest)) => canonicalize(&format!("{}:{}.{}", kind, address, rest)),
        None if in_root => canonicalize(label),
        None => canonicalize(&format!("{}.{}", address, label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("  Main Result, Part 2 "), "main_result_part_2");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_note_address() {
        assert_eq!(note_address("folder/Lemma A.md"), "Lemma A");
        assert_eq!(note_address("Lemma A"), "Lemma A");
        assert_eq!(note_address(" B "), "B");
        assert_eq!(note_address("fig.png"), "fig.png");
    }

    #[test]
    fn test_label_from_location() {
        assert_eq!(label_from_location("", ""), "sec:statement");
        assert_eq!(label_from_location("", "intro.setup"), "sec:intro.setup");
        assert_eq!(label_from_location("B", ""), "res:b.statement");
        assert_eq!(
            label_from_location("Big Lemma", "proof"),
            "res:big_lemma.proof"
        );
    }

    #[test]
    fn test_header_paths_stay_distinct() {
        let a = label_from_location("B", &header_path(&["Setup", "Intro"]));
        let b = label_from_location("B", &header_path(&["Intro"]));
        assert_ne!(a, b);
        assert_eq!(anchor_path("Setup#Intro"), "setup.intro");
    }

    #[test]
    fn test_explicit_label() {
        assert_eq!(explicit_label("lem-main", "Root", "Root"), "lem:main");
        assert_eq!(explicit_label("lem-main", "B", "Root"), "lem:b.main");
        assert_eq!(explicit_label("eq-a-b", "", "Root"), "eq:a-b");
        assert_eq!(explicit_label("plain", "B", "Root"), "b.plain");
    }

    proptest! {
        #[test]
        fn test_canonicalize_idempotent(raw in "[ -~\t]{0,40}") {
            let once = canonicalize(&raw);
            prop_assert_eq!(canonicalize(&once), once.clone());
            prop_assert!(!once.contains(' '));
            prop_assert!(!once.contains(','));
            prop_assert_eq!(once.to_lowercase(), once);
        }
    }
}
