use std::collections::HashMap;
use std::sync::LazyLock;

const ENGLISH: &str = include_str!("locales/en-US.json");
const TURKISH: &str = include_str!("locales/tr.json");

static TRANSLATIONS: LazyLock<HashMap<Language, HashMap<String, String>>> = LazyLock::new(|| {
    HashMap::from([
        (
            Language::English,
            serde_json::from_str(ENGLISH).expect("embedded en-US translations"),
        ),
        (
            Language::Turkish,
            serde_json::from_str(TURKISH).expect("embedded tr translations"),
        ),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    English,
    Turkish,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::English => "en-US",
            Language::Turkish => "tr",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.trim().to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Language::English),
            "tr" => Some(Language::Turkish),
            _ => None,
        }
    }

    /// Picks the best supported language from an `Accept-Language`
    /// header, honouring `q` weights. Falls back to English.
    pub fn negotiate(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Language::default();
        };
        let mut best: Option<(f32, Language)> = None;
        for entry in header.split(',') {
            let mut parts = entry.split(';');
            let Some(language) = parts.next().and_then(Language::from_tag) else {
                continue;
            };
            let weight = parts
                .find_map(|param| param.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            if best.map_or(true, |(current, _)| weight > current) {
                best = Some((weight, language));
            }
        }
        best.map(|(_, language)| language).unwrap_or_default()
    }
}

/// Translation table for one request.
#[derive(Debug, Clone, Copy)]
pub struct Translations {
    language: Language,
}

impl Translations {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// The translated text, or `key` itself when there is none.
    pub fn get<'a>(&self, key: &'a str) -> &'a str {
        TRANSLATIONS
            .get(&self.language)
            .and_then(|table| table.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_by_weight() {
        assert_eq!(Language::negotiate(None), Language::English);
        assert_eq!(Language::negotiate(Some("tr-TR,tr;q=0.9")), Language::Turkish);
        assert_eq!(
            Language::negotiate(Some("de-DE, tr;q=0.5, en-GB;q=0.8")),
            Language::English
        );
        assert_eq!(Language::negotiate(Some("fr, de")), Language::English);
    }

    #[test]
    fn embedded_tables_cover_the_same_keys() {
        let english = &TRANSLATIONS[&Language::English];
        let turkish = &TRANSLATIONS[&Language::Turkish];
        let mut english_keys: Vec<_> = english.keys().collect();
        let mut turkish_keys: Vec<_> = turkish.keys().collect();
        english_keys.sort();
        turkish_keys.sort();
        assert_eq!(english_keys, turkish_keys);

        assert_eq!(Translations::new(Language::Turkish).get("settings"), "Ayarlar");
        assert_eq!(Translations::new(Language::English).get("missing-key"), "missing-key");
    }
}
