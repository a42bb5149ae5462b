//! Naming helpers shared by the registry and the serializer.

use convert_case::{Case, Casing};

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
];

pub fn pluralize(word: &str) -> String {
    if let Some(plural) = replace_suffix(word, IRREGULAR.iter().map(|(s, p)| (*s, *p))) {
        return plural;
    }
    let lower = word.to_ascii_lowercase();
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}es", word);
    }
    if lower.ends_with('y') && !ends_with_vowel_y(&lower) {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    format!("{}s", word)
}

pub fn singularize(word: &str) -> String {
    if let Some(single) = replace_suffix(word, IRREGULAR.iter().map(|(s, p)| (*p, *s))) {
        return single;
    }
    let lower = word.to_ascii_lowercase();
    if lower.ends_with("ies") && lower.len() > 3 {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "xes", "zes", "ches", "shes"].iter().any(|end| lower.ends_with(end)) {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 1 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// `wordSmith` -> `word-smith`
pub fn dasherize(word: &str) -> String {
    word.to_case(Case::Kebab)
}

// Irregular forms only match the last camelCase segment, so `blogPerson` works too.
fn replace_suffix<'a>(
    word: &str,
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
) -> Option<String> {
    for (from, to) in pairs {
        if word == from {
            return Some(to.to_string());
        }
        let capitalized = capitalize(from);
        if let Some(stem) = word.strip_suffix(capitalized.as_str()) {
            return Some(format!("{}{}", stem, capitalize(to)));
        }
    }
    None
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn ends_with_vowel_y(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    bytes.len() >= 2 && matches!(bytes[bytes.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u')
}
