/*!
 * Tests for glossary matching and request annotation
 */

use locbatch::translation::{AnnotationStyle, Glossary, GlossaryInjector};

fn glossary(pairs: &[(&str, &str)]) -> Glossary {
    pairs
        .iter()
        .map(|(t, tr)| (t.to_string(), tr.to_string()))
        .collect()
}

/// Terms match whole words only, ignoring case
#[test]
fn test_matching_terms_withSubstring_shouldNotMatch() {
    let injector = GlossaryInjector::new(&glossary(&[("Caller", "Вабик")]));

    assert_eq!(injector.matching_terms("Use the caller now"), vec![("Caller", "Вабик")]);
    assert!(injector.matching_terms("Callers everywhere").is_empty());
    assert!(injector.matching_terms("Recaller").is_empty());
}

/// Regex metacharacters in terms match literally
#[test]
fn test_matching_terms_withMetacharacters_shouldMatchLiterally() {
    let injector = GlossaryInjector::new(&glossary(&[("C++", "Сі++"), ("v1.0", "в1.0")]));

    assert_eq!(injector.matching_terms("Written in C++ today").len(), 1);
    assert!(injector.matching_terms("Written in C today").is_empty());
    assert!(injector.matching_terms("Release v1x0").is_empty());
    assert_eq!(injector.matching_terms("Release v1.0").len(), 1);
}

/// Several matches are listed in glossary order
#[test]
fn test_annotate_withTwoTerms_shouldJoinInGlossaryOrder() {
    let injector = GlossaryInjector::new(&glossary(&[("Caller", "Вабик"), ("Badger", "Борсук")]));

    let (text, matched) = injector.annotate("Caller meets Badger", AnnotationStyle::Generative);
    assert!(matched);
    assert_eq!(text, "[[GLOSSARY: Badger=Борсук; Caller=Вабик]] Caller meets Badger");
}

/// Engine style wraps the annotation in the ignored tag
#[test]
fn test_annotate_withEngineStyle_shouldUseIgnoredTag() {
    let injector = GlossaryInjector::new(&glossary(&[("Badger", "Борсук")]));

    let (text, matched) = injector.annotate("A badger", AnnotationStyle::Engine);
    assert!(matched);
    assert_eq!(text, "<gl>Badger=Борсук</gl> A badger");
}

/// No match leaves the text alone
#[test]
fn test_annotate_withoutMatch_shouldReturnTextUnchanged() {
    let injector = GlossaryInjector::new(&glossary(&[("Badger", "Борсук")]));
    assert_eq!(
        injector.annotate("Nothing here", AnnotationStyle::Generative),
        ("Nothing here".to_string(), false)
    );
}

/// Either span form is removed from a response
#[test]
fn test_strip_withEitherSpan_shouldReturnBareTranslation() {
    assert_eq!(GlossaryInjector::strip("[[GLOSSARY: Badger=Борсук]] Борсук"), "Борсук");
    assert_eq!(GlossaryInjector::strip("<gl>Badger=Борсук</gl> Борсук"), "Борсук");
    assert_eq!(GlossaryInjector::strip("Борсук"), "Борсук");
}

/// The pairs of a span can be read back
#[test]
fn test_annotated_terms_shouldParseSpan() {
    let terms = GlossaryInjector::annotated_terms("<gl>Badger=Борсук; Caller=Вабик</gl> text");
    assert_eq!(
        terms,
        vec![
            ("Badger".to_string(), "Борсук".to_string()),
            ("Caller".to_string(), "Вабик".to_string())
        ]
    );
}

/// Import format skips comments, blanks and lines without '='
#[test]
fn test_parse_pairs_withCommentsAndGarbage_shouldKeepValidLines() {
    let pairs = Glossary::parse_pairs("# terms\nCaller = Вабик\n\nbroken line\nBadger=Борсук\n");
    assert_eq!(
        pairs,
        vec![
            ("Caller".to_string(), "Вабик".to_string()),
            ("Badger".to_string(), "Борсук".to_string())
        ]
    );
}

/// Blank terms never enter the glossary
#[test]
fn test_insert_withBlankTerm_shouldBeIgnored() {
    let mut glossary = Glossary::new();
    assert!(!glossary.insert("  ", "x"));
    assert!(glossary.insert(" Badger ", " Борсук "));
    assert_eq!(glossary.get("Badger"), Some("Борсук"));
    assert_eq!(glossary.len(), 1);
}
