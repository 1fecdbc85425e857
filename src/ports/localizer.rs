//! Localizer Port - key-based lookup of every user-facing string.
//!
//! Reflection questions, speaker labels, export headings, AI prompts and
//! fallback texts are all resolved through this trait. Lifecycle code never
//! carries inline literals for any of them.
//!
//! Templates use `{{name}}` placeholders, filled by `translate`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    It,
    De,
    Fr,
    Es,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::It => "it",
            Locale::De => "de",
            Locale::Fr => "fr",
            Locale::Es => "es",
        }
    }

    pub fn all() -> &'static [Locale] {
        &[Locale::En, Locale::It, Locale::De, Locale::Fr, Locale::Es]
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Locale {
    type Err = ValidationError;

    /// Accepts bare codes and region tags ("it", "it-IT", "en_GB").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        Locale::all()
            .iter()
            .copied()
            .find(|l| l.code() == primary)
            .ok_or_else(|| {
                ValidationError::invalid_format("locale", format!("unsupported locale '{}'", s))
            })
    }
}

/// Port for translated strings.
pub trait Localizer: Send + Sync {
    /// Raw template for `key` in exactly `locale`, if the catalogue has it.
    fn lookup(&self, locale: Locale, key: &str) -> Option<String>;

    /// Locale used when a key is missing from the requested one.
    fn fallback_locale(&self) -> Locale {
        Locale::En
    }

    /// Resolves `key` with `{{param}}` interpolation.
    ///
    /// Falls back to the fallback locale, then to the key itself so that a
    /// missing entry is visible rather than silent.
    fn translate(&self, locale: Locale, key: &str, params: &[(&str, &str)]) -> String {
        let template = self
            .lookup(locale, key)
            .or_else(|| self.lookup(self.fallback_locale(), key))
            .unwrap_or_else(|| key.to_string());
        interpolate(&template, params)
    }
}

/// Replaces every `{{name}}` in `template` with its value from `params`.
///
/// The template is scanned once, left to right. Inserted values are never
/// scanned again, so a value containing `{{other}}` stays as written.
/// Unknown placeholders are left untouched.
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };

        let name = &after[..close];
        if name.contains("{{") {
            // Stray opening braces: emit them and retry from the next `{{`.
            out.push_str("{{");
            rest = after;
            continue;
        }
        match params.iter().find(|(key, _)| *key == name.trim()) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLocalizer(HashMap<(Locale, &'static str), &'static str>);

    impl Localizer for MapLocalizer {
        fn lookup(&self, locale: Locale, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|((l, k), _)| *l == locale && *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn localizer() -> MapLocalizer {
        let mut map = HashMap::new();
        map.insert((Locale::En, "greeting"), "Hello {{name}}");
        map.insert((Locale::It, "greeting"), "Ciao {{name}}");
        map.insert((Locale::En, "only.en"), "English only");
        MapLocalizer(map)
    }

    #[test]
    fn translate_interpolates_params() {
        let l = localizer();
        assert_eq!(l.translate(Locale::It, "greeting", &[("name", "Ada")]), "Ciao Ada");
    }

    #[test]
    fn missing_key_falls_back_to_default_locale() {
        let l = localizer();
        assert_eq!(l.translate(Locale::De, "only.en", &[]), "English only");
    }

    #[test]
    fn unknown_key_returns_key() {
        let l = localizer();
        assert_eq!(l.translate(Locale::En, "nope.missing", &[]), "nope.missing");
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders() {
        assert_eq!(interpolate("{{a}} and {{b}}", &[("a", "x")]), "x and {{b}}");
    }

    #[test]
    fn interpolated_values_are_not_rescanned() {
        let out = interpolate(
            "Transcript:\n{{conversationText}}\nReflection:\n{{userReflection}}",
            &[
                ("conversationText", "Student: what does {{userReflection}} mean?"),
                ("userReflection", "I learned a lot"),
            ],
        );
        assert_eq!(
            out,
            "Transcript:\nStudent: what does {{userReflection}} mean?\nReflection:\nI learned a lot"
        );
    }

    #[test]
    fn interpolate_handles_stray_braces() {
        assert_eq!(interpolate("{{ {{a}} }}", &[("a", "x")]), "{{ x }}");
        assert_eq!(interpolate("open {{a", &[("a", "x")]), "open {{a");
        assert_eq!(interpolate("{{ a }}!", &[("a", "x")]), "x!");
    }

    #[test]
    fn locale_parses_region_tags() {
        assert_eq!("it-IT".parse::<Locale>().unwrap(), Locale::It);
        assert_eq!("en_GB".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!(" FR ".parse::<Locale>().unwrap(), Locale::Fr);
        assert!("xx".parse::<Locale>().is_err());
    }
}
