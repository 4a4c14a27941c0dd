//! Client-side narrowing of a committed result set.
//!
//! These filters never issue a query; they only select from what the last
//! round committed.

use crate::favorites::FavoriteSet;
use crate::model::ProximityResult;

/// Display filters applied on top of the committed results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFilter {
    /// Free text matched against name, description and municipality
    pub search_text: String,
    /// Keep favorites only
    pub favorites_only: bool,
    /// Keep active records only
    pub active_only: bool,
}

impl DisplayFilter {
    /// Sets the search text.
    #[must_use]
    pub fn with_search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    /// Sets favorites-only.
    #[must_use]
    pub fn with_favorites_only(mut self, favorites_only: bool) -> Self {
        self.favorites_only = favorites_only;
        self
    }

    /// Sets active-only.
    #[must_use]
    pub fn with_active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    /// Results passing every filter, in their original order.
    pub fn apply<'a>(&self, results: &'a [ProximityResult], favorites: &FavoriteSet) -> Vec<&'a ProximityResult> {
        let needle = normalize(&self.search_text);

        results
            .iter()
            .filter(|r| !self.favorites_only || favorites.contains(r.point.id))
            .filter(|r| !self.active_only || r.point.is_active())
            .filter(|r| needle.is_empty() || matches_text(r, &needle))
            .collect()
    }
}

fn matches_text(result: &ProximityResult, needle: &str) -> bool {
    let point = &result.point;
    std::iter::once(Some(point.name.as_str()))
        .chain([point.description.as_deref(), point.municipality.as_deref()])
        .flatten()
        .any(|field| normalize(field).contains(needle))
}

/// Lowercases, trims and strips Latin diacritics.
pub fn normalize(text: &str) -> String {
    text.trim().chars().flat_map(char::to_lowercase).map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointOfInterest;

    fn result(id: i64, name: &str, municipality: &str, active: bool) -> ProximityResult {
        let mut point = PointOfInterest::new(id, name, 18.4, -66.1);
        point.municipality = Some(municipality.to_string());
        point.visibility.activo = Some(active);
        ProximityResult {
            point,
            logo_url: String::new(),
            cover_url: String::new(),
            travel: None,
            is_favorite: false,
            is_open_now: false,
        }
    }

    fn fixture() -> Vec<ProximityResult> {
        vec![
            result(1, "Café Mañana", "San Juan", true),
            result(2, "Panadería La Sevillana", "Bayamón", true),
            result(3, "El Mesón", "Mayagüez", false),
        ]
    }

    fn ids(selected: &[&ProximityResult]) -> Vec<i64> {
        selected.iter().map(|r| r.point.id).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Café MAÑANA "), "cafe manana");
        assert_eq!(normalize("Mayagüez"), "mayaguez");
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let results = fixture();
        let selected = DisplayFilter::default().apply(&results, &FavoriteSet::default());
        assert_eq!(ids(&selected), vec![1, 2, 3]);
    }

    #[test]
    fn test_accent_insensitive_search() {
        let results = fixture();
        let favorites = FavoriteSet::default();

        let by_name = DisplayFilter::default().with_search_text("manana").apply(&results, &favorites);
        assert_eq!(ids(&by_name), vec![1]);

        let by_town = DisplayFilter::default().with_search_text("MAYAGUEZ").apply(&results, &favorites);
        assert_eq!(ids(&by_town), vec![3]);
    }

    #[test]
    fn test_favorites_and_active() {
        let results = fixture();
        let favorites = FavoriteSet::local([2, 3]);

        let selected = DisplayFilter::default()
            .with_favorites_only(true)
            .with_active_only(true)
            .apply(&results, &favorites);
        assert_eq!(ids(&selected), vec![2]);
    }
}
