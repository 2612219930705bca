//! Bilingual text.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A display language supported by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    /// Pick a locale from an `Accept-Language` header or a `lang` query value.
    ///
    /// The first tag whose primary subtag is `ar` or `en` wins; anything else
    /// falls back to English.
    #[must_use]
    pub fn negotiate(header: &str) -> Self {
        header
            .split(',')
            .filter_map(|tag| tag.split(';').next())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .find_map(|tag| match tag.split(['-', '_']).next() {
                Some("ar") => Some(Self::Ar),
                Some("en") => Some(Self::En),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A string carried in both English and Arabic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub ar: String,
}

impl LocalizedText {
    #[must_use]
    pub fn new(en: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ar: ar.into(),
        }
    }

    /// Text for `locale`, falling back to the other language when empty.
    #[must_use]
    pub fn get(&self, locale: Locale) -> &str {
        let (preferred, fallback) = match locale {
            Locale::En => (&self.en, &self.ar),
            Locale::Ar => (&self.ar, &self.en),
        };
        if preferred.trim().is_empty() {
            fallback
        } else {
            preferred
        }
    }

    /// Both languages are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.en.trim().is_empty() && !self.ar.trim().is_empty()
    }

    /// Case-insensitive substring match against either language.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.en.to_lowercase().contains(&needle) || self.ar.to_lowercase().contains(&needle)
    }

    /// Trim both languages.
    #[must_use]
    pub fn trimmed(self) -> Self {
        Self {
            en: self.en.trim().to_owned(),
            ar: self.ar.trim().to_owned(),
        }
    }
}
