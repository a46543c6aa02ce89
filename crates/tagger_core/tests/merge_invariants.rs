use std::collections::HashSet;

use pretty_assertions::assert_eq;
use tagger_core::{merge_codes, CodeSet, NomenclatureCode};

fn code(raw: &str) -> NomenclatureCode {
    raw.parse().unwrap()
}

fn assert_one_code_per_base(notes: &str) {
    let set = CodeSet::parse(notes);
    let mut seen = HashSet::new();
    for code in set.codes() {
        assert!(seen.insert(code.base), "duplicate base {} in {notes:?}", code.base);
    }
}

#[test]
fn merge_table() {
    // (existing notes, incoming code, expected notes, changed)
    let cases = [
        ("", "05-03-10", "05-03-10", true),
        ("05-03-10", "05-03-10", "05-03-10", false),
        ("05-03-10", "05-03-10B", "05-03-10B", true),
        ("05-03-10B", "05-03-10", "05-03-10B", false),
        ("05-03-10B", "05-03-10B!", "05-03-10B!", true),
        ("05-03-10B!", "05-03-10B", "05-03-10B!", false),
        ("05-03-10!", "05-03-10C", "05-03-10C!", true),
        ("05-03-10B", "05-03-10C", "05-03-10C", true),
        ("04-03-10B", "05-03-10", "04-03-10B, 05-03-10", true),
        ("04-03-0", "05-03-0", "04-03-0, 05-03-0", true),
        ("nota libre", "05-03-10A", "nota libre, 05-03-10A", true),
        ("5-3-10b", "05-03-10B", "05-03-10B", true),
    ];

    for (existing, incoming, expected, changed) in cases {
        let outcome = merge_codes(existing, &[code(incoming)]);
        assert_eq!(
            (outcome.text().as_str(), outcome.changed),
            (expected, changed),
            "merging {incoming:?} into {existing:?}"
        );
        assert_one_code_per_base(&outcome.text());
    }
}

#[test]
fn load_confirmation_is_never_lost() {
    let mut notes = String::from("05-03-10!");
    for incoming in ["05-03-10", "05-03-10A", "05-03-10B", "05-03-10"] {
        let outcome = merge_codes(&notes, &[code(incoming)]);
        notes = outcome.text();
        assert!(notes.ends_with('!'), "lost load flag after {incoming}: {notes}");
    }
    assert_eq!(notes, "05-03-10B!");
}

#[test]
fn stale_duplicates_collapse_to_the_longer_entry() {
    let outcome = merge_codes("05-03-10, 05-03-10B, 06-03-10", &[]);
    assert_eq!(outcome.text(), "05-03-10B, 06-03-10");
    assert!(outcome.changed);

    let outcome = merge_codes("05-03-10B, 05-03-10!", &[]);
    assert_eq!(outcome.text(), "05-03-10B!");

    let outcome = merge_codes("05-03-10A, 05-03-10C", &[]);
    assert_eq!(outcome.text(), "05-03-10A");
}

#[test]
fn several_incoming_codes_merge_in_order() {
    let outcome = merge_codes(
        "05-03-10",
        &[code("05-03-10A"), code("05-03-16"), code("05-03-10!")],
    );
    assert_eq!(outcome.text(), "05-03-10A!, 05-03-16");
    assert_one_code_per_base(&outcome.text());
}
