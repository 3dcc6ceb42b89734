/*!
 * Glossary and glossary context injection.
 *
 * The glossary maps source terms to mandated target terms. Before a batch is
 * sent, the injector finds the terms each string contains and prepends them
 * as a span the backend is told not to translate. The span is stripped from
 * whatever comes back.
 *
 * Terms and translations are escaped inside the span so that no glossary
 * text can close it early: a backslash precedes `\`, `]`, `;` and `=`, and
 * engine spans are additionally XML-escaped.
 */

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::database::Repository;

/// Leading generative-style span `[[GLOSSARY: ...]]` and the single space after it
static GENERATIVE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\[\[GLOSSARY:((?:[^\\\]]|\\.)*)\]\] ?").expect("Invalid generative span regex")
});

/// Leading engine-style span `<gl>...</gl>` and the single space after it
static ENGINE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<gl>([^<]*)</gl> ?").expect("Invalid engine span regex")
});

/// Characters with a meaning inside a span
const SPAN_SPECIALS: &[char] = &['\\', ']', ';', '='];

/// Tag name the engine backend is told to leave alone
pub const ENGINE_IGNORE_TAG: &str = "gl";

/// How a backend expects the glossary annotation to be wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStyle {
    /// Bracketed marker understood by instruction-following models
    Generative,
    /// XML tag excluded from translation by the engine
    Engine,
}

/// User-editable source term → target term mapping, ordered by term
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
}

impl Glossary {
    /// Create an empty glossary
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted glossary
    pub fn load(repo: &Repository) -> Result<Self> {
        let terms: BTreeMap<String, String> = repo.load_glossary()?.into_iter().collect();
        debug!("Loaded {} glossary terms", terms.len());
        Ok(Self { terms })
    }

    /// Add or replace a term; blank terms are ignored
    pub fn insert(&mut self, term: impl Into<String>, translation: impl Into<String>) -> bool {
        let term = term.into().trim().to_string();
        if term.is_empty() {
            return false;
        }
        self.terms.insert(term, translation.into().trim().to_string());
        true
    }

    /// Remove a term
    pub fn remove(&mut self, term: &str) -> Option<String> {
        self.terms.remove(term.trim())
    }

    /// Look up the mandated translation for a term
    pub fn get(&self, term: &str) -> Option<&str> {
        self.terms.get(term).map(String::as_str)
    }

    /// Iterate over terms in glossary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Parse `term=translation` lines; blank lines and `#` comments are skipped
    pub fn parse_pairs(text: &str) -> Vec<(String, String)> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| match line.split_once('=') {
                Some((term, translation)) if !term.trim().is_empty() => {
                    Some((term.trim().to_string(), translation.trim().to_string()))
                }
                _ => {
                    warn!("Skipping glossary line without 'term=translation': {}", line);
                    None
                }
            })
            .collect()
    }

    /// Read glossary pairs from a file, without applying them
    pub fn read_pairs_file(path: &Path) -> Result<Vec<(String, String)>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {:?}", path))?;
        Ok(Self::parse_pairs(&text))
    }
}

impl FromIterator<(String, String)> for Glossary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut glossary = Self::new();
        for (term, translation) in iter {
            glossary.insert(term, translation);
        }
        glossary
    }
}

/// Compiled matcher over a glossary snapshot
pub struct GlossaryInjector {
    // @field: (term, translation, whole-word matcher), in glossary order
    entries: Vec<(String, String, Regex)>,
}

impl GlossaryInjector {
    /// Compile matchers for every glossary term
    pub fn new(glossary: &Glossary) -> Self {
        let entries = glossary
            .iter()
            .filter_map(|(term, translation)| {
                // Word boundaries are spelled out so terms starting or ending
                // with punctuation still need a non-word neighbour
                let pattern = format!(r"(?:^|[^\w]){}(?:$|[^\w])", regex::escape(term));
                match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                    Ok(regex) => Some((term.to_string(), translation.to_string(), regex)),
                    Err(e) => {
                        warn!("Skipping glossary term '{}': {}", term, e);
                        None
                    }
                }
            })
            .collect();

        Self { entries }
    }

    /// Glossary terms occurring in `text` as whole words, in glossary order
    pub fn matching_terms(&self, text: &str) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter(|(_, _, regex)| regex.is_match(text))
            .map(|(term, translation, _)| (term.as_str(), translation.as_str()))
            .collect()
    }

    /// Render matched terms as `term1=translation1; term2=translation2`
    pub fn annotation(terms: &[(&str, &str)]) -> String {
        terms
            .iter()
            .map(|(term, translation)| format!("{}={}", escape_span_text(term), escape_span_text(translation)))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Prepend the glossary span for `text`
    ///
    /// Returns the text unchanged, and `false`, when no term matches.
    pub fn annotate(&self, text: &str, style: AnnotationStyle) -> (String, bool) {
        let terms = self.matching_terms(text);
        if terms.is_empty() {
            return (text.to_string(), false);
        }

        let annotation = Self::annotation(&terms);
        let annotated = match style {
            AnnotationStyle::Generative => format!("[[GLOSSARY: {}]] {}", annotation, text),
            AnnotationStyle::Engine => format!(
                "<{tag}>{}</{tag}> {}",
                xml_escape(&annotation),
                text,
                tag = ENGINE_IGNORE_TAG
            ),
        };
        (annotated, true)
    }

    /// Remove a leading glossary span of either style plus the one space after it
    ///
    /// Any further whitespace belongs to the text and is kept.
    pub fn strip(response: &str) -> String {
        if let Some(m) = GENERATIVE_SPAN.find(response) {
            return response[m.end()..].to_string();
        }
        if let Some(m) = ENGINE_SPAN.find(response) {
            return response[m.end()..].to_string();
        }
        response.to_string()
    }

    /// Read back the `term=translation` pairs carried by a leading span
    pub fn annotated_terms(text: &str) -> Vec<(String, String)> {
        let annotation = GENERATIVE_SPAN
            .captures(text)
            .map(|caps| caps[1].to_string())
            .or_else(|| ENGINE_SPAN.captures(text).map(|caps| xml_unescape(&caps[1])));

        annotation
            .map(|annotation| parse_annotation(&annotation))
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn escape_span_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPAN_SPECIALS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

/// Split escaped `term=translation; ...` text back into unescaped pairs
fn parse_annotation(annotation: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut term: Option<String> = None;
    let mut current = String::new();
    let mut chars = annotation.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '=' if term.is_none() => term = Some(std::mem::take(&mut current)),
            ';' => {
                if let Some(term) = term.take() {
                    pairs.push((term.trim().to_string(), current.trim().to_string()));
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if let Some(term) = term {
        pairs.push((term.trim().to_string(), current.trim().to_string()));
    }
    pairs
}
