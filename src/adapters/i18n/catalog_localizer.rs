//! Catalog Localizer - Implementation of the Localizer port.
//!
//! Catalogues are nested YAML documents embedded in the binary via
//! `include_str!`. Nested keys are flattened into dotted paths
//! (`activities.convinceMe.reflection.questions.1`) once, on first use.
//!
//! Only English and Italian ship a catalogue. Every other locale resolves
//! through the fallback locale.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_yaml::Value;
use thiserror::Error;

use crate::ports::{Locale, Localizer};

type Catalog = HashMap<String, String>;

/// Errors loading a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalogue for '{locale}' is not valid YAML: {message}")]
    Parse { locale: Locale, message: String },

    #[error("catalogue for '{locale}' has a non-text value at '{key}'")]
    InvalidValue { locale: Locale, key: String },
}

static EMBEDDED: Lazy<Result<Arc<HashMap<Locale, Catalog>>, CatalogError>> = Lazy::new(|| {
    CatalogLocalizer::parse_all(&[
        (Locale::En, include_str!("../../../locales/en.yaml")),
        (Locale::It, include_str!("../../../locales/it.yaml")),
    ])
    .map(Arc::new)
});

/// [`Localizer`] backed by flattened YAML catalogues.
#[derive(Debug, Clone)]
pub struct CatalogLocalizer {
    catalogs: Arc<HashMap<Locale, Catalog>>,
    fallback: Locale,
}

impl CatalogLocalizer {
    /// Localizer over the catalogues compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        let catalogs = EMBEDDED.as_ref().map_err(Clone::clone)?;
        Ok(Self {
            catalogs: Arc::clone(catalogs),
            fallback: Locale::En,
        })
    }

    /// Localizer over caller-provided YAML sources.
    pub fn from_sources(sources: &[(Locale, &str)]) -> Result<Self, CatalogError> {
        Ok(Self {
            catalogs: Arc::new(Self::parse_all(sources)?),
            fallback: Locale::En,
        })
    }

    pub fn with_fallback(mut self, locale: Locale) -> Self {
        self.fallback = locale;
        self
    }

    /// Locales that have their own catalogue.
    pub fn available_locales(&self) -> Vec<Locale> {
        let mut locales: Vec<Locale> = self.catalogs.keys().copied().collect();
        locales.sort_by_key(|l| l.code());
        locales
    }

    /// Keys present in `locale`'s own catalogue, sorted.
    pub fn keys(&self, locale: Locale) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .catalogs
            .get(&locale)
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    fn parse_all(sources: &[(Locale, &str)]) -> Result<HashMap<Locale, Catalog>, CatalogError> {
        sources
            .iter()
            .map(|(locale, source)| Ok((*locale, Self::parse(*locale, source)?)))
            .collect()
    }

    fn parse(locale: Locale, source: &str) -> Result<Catalog, CatalogError> {
        let root: Value = serde_yaml::from_str(source).map_err(|e| CatalogError::Parse {
            locale,
            message: e.to_string(),
        })?;
        let mut catalog = Catalog::new();
        flatten(locale, "", &root, &mut catalog)?;
        Ok(catalog)
    }
}

fn key_segment(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

fn flatten(
    locale: Locale,
    prefix: &str,
    value: &Value,
    out: &mut Catalog,
) -> Result<(), CatalogError> {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let segment = key_segment(k).ok_or_else(|| CatalogError::InvalidValue {
                    locale,
                    key: join(prefix, "?"),
                })?;
                flatten(locale, &join(prefix, &segment), v, out)?;
            }
        }
        Value::Sequence(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten(locale, &join(prefix, &(i + 1).to_string()), v, out)?;
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Null => {}
        Value::Tagged(_) => {
            return Err(CatalogError::InvalidValue {
                locale,
                key: prefix.to_string(),
            })
        }
    }
    Ok(())
}

impl Localizer for CatalogLocalizer {
    fn lookup(&self, locale: Locale, key: &str) -> Option<String> {
        self.catalogs.get(&locale)?.get(key).cloned()
    }

    fn fallback_locale(&self) -> Locale {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityType;

    mod embedded {
        use super::*;

        #[test]
        fn embedded_catalogues_load() {
            let l = CatalogLocalizer::embedded().unwrap();
            assert_eq!(l.available_locales(), vec![Locale::En, Locale::It]);
        }

        #[test]
        fn every_activity_has_title_and_questions_in_every_catalogue() {
            let l = CatalogLocalizer::embedded().unwrap();
            for locale in l.available_locales() {
                for activity in ActivityType::all() {
                    assert!(
                        l.lookup(locale, &activity.title_key()).is_some(),
                        "{} missing title for {}",
                        locale,
                        activity
                    );
                    for key in activity.reflection_question_keys() {
                        assert!(l.lookup(locale, &key).is_some(), "{} missing {}", locale, key);
                    }
                }
            }
        }

        #[test]
        fn italian_has_every_english_key() {
            let l = CatalogLocalizer::embedded().unwrap();
            let missing: Vec<&str> = l
                .keys(Locale::En)
                .into_iter()
                .filter(|k| l.lookup(Locale::It, k).is_none())
                .collect();
            assert!(missing.is_empty(), "missing in it: {:?}", missing);
        }

        #[test]
        fn german_falls_back_to_english() {
            let l = CatalogLocalizer::embedded().unwrap();
            assert_eq!(l.translate(Locale::De, "labels.student", &[]), "Student");
            assert_eq!(l.translate(Locale::It, "labels.student", &[]), "Studente");
        }

        #[test]
        fn evaluation_instruction_names_score_markers() {
            let l = CatalogLocalizer::embedded().unwrap();
            for locale in [Locale::En, Locale::It] {
                let text = l.translate(locale, "ai.systemInstructions.evaluation", &[]);
                assert!(text.contains("CONVERSATION_SCORE:"));
                assert!(text.contains("REFLECTION_RATIONALE:"));
            }
        }
    }

    mod parsing {
        use super::*;

        #[test]
        fn nested_keys_are_flattened() {
            let l = CatalogLocalizer::from_sources(&[(
                Locale::En,
                "a:\n  b:\n    c: deep\n  n: 3\nlist:\n  - first\n  - second\n",
            )])
            .unwrap();
            assert_eq!(l.lookup(Locale::En, "a.b.c").as_deref(), Some("deep"));
            assert_eq!(l.lookup(Locale::En, "a.n").as_deref(), Some("3"));
            assert_eq!(l.lookup(Locale::En, "list.2").as_deref(), Some("second"));
        }

        #[test]
        fn numeric_keys_become_segments() {
            let l = CatalogLocalizer::from_sources(&[(Locale::En, "q:\n  1: one\n")]).unwrap();
            assert_eq!(l.lookup(Locale::En, "q.1").as_deref(), Some("one"));
        }

        #[test]
        fn invalid_yaml_is_reported_with_locale() {
            let err = CatalogLocalizer::from_sources(&[(Locale::It, "a: [unclosed")]).unwrap_err();
            assert!(matches!(err, CatalogError::Parse { locale: Locale::It, .. }));
        }

        #[test]
        fn custom_fallback_locale_is_used() {
            let l = CatalogLocalizer::from_sources(&[(Locale::It, "k: italiano\n")])
                .unwrap()
                .with_fallback(Locale::It);
            assert_eq!(l.translate(Locale::Fr, "k", &[]), "italiano");
        }
    }
}
