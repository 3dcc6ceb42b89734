use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Backends disagree on how a target language is named: generative backends
/// want a human-readable name for the prompt, engine backends want their own
/// uppercase code. Everything here starts from an ISO 639-1 or 639-2 code.

/// Map ISO 639-2/B codes to their ISO 639-2/T equivalent
fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    let mapped = match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "alb" => "sqi",
        "arm" => "hye",
        "baq" => "eus",
        "bur" => "mya",
        "per" => "fas",
        "geo" => "kat",
        "may" => "msa",
        "mac" => "mkd",
        "rum" => "ron",
        "slo" => "slk",
        "wel" => "cym",
        _ => return None,
    };
    Some(mapped)
}

/// Resolve a 2- or 3-letter code to a language
fn resolve(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();
    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => {
            let part2t = bibliographic_to_terminology(&normalized_code).unwrap_or(&normalized_code);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    resolve(code)
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible
/// Falls back to ISO 639-2/T if no ISO 639-1 code exists
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let lang = resolve(code)
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;

    Ok(lang
        .to_639_1()
        .map(|c| c.to_string())
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Stable key for per-language storage: ISO 639-2/T when the code is known
///
/// `uk`, `ukr` and `UK` all map to `ukr`. Unknown codes are kept, trimmed
/// and lowercased.
pub fn language_key(code: &str) -> String {
    normalize_to_part2t(code).unwrap_or_else(|_| code.trim().to_lowercase())
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (resolve(code1), resolve(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = resolve(code)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(lang.to_name().to_string())
}

/// ISO 639-1 codes DeepL accepts as `target_lang`
const DEEPL_TARGETS: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "he", "hu", "id", "it",
    "ja", "ko", "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "th", "tr",
    "uk", "vi", "zh",
];

/// Target language code in the form the DeepL API expects
///
/// Fails for codes that are not languages and for languages DeepL cannot
/// translate into.
pub fn deepl_target_code(code: &str) -> Result<String> {
    let part1 = normalize_to_part1_or_part2t(code)?;
    if !DEEPL_TARGETS.contains(&part1.as_str()) {
        return Err(anyhow!("DeepL cannot translate into '{}'", code.trim()));
    }

    // DeepL requires a regional variant for these targets
    let code = match part1.as_str() {
        "en" => "EN-US".to_string(),
        "pt" => "PT-PT".to_string(),
        "zh" => "ZH-HANS".to_string(),
        other => other.to_uppercase(),
    };
    Ok(code)
}
