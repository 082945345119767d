//! Marker colours per collision type.
//!
//! Categories get palette slots in order of first appearance, wrapping
//! around once the palette runs out. Anything that was not observed when
//! the assignment was built (including a missing collision type) gets
//! [`FALLBACK_COLOR`], which is never a palette entry.

use std::collections::BTreeMap;

use crash_map_crash_models::NormalizedRecord;

/// Colour-blind friendly palette, repeated to 16 slots.
pub const PALETTE: [&str; 16] = [
    "#E69F00", "#56B4E9", "#009E73", "#F0E442", "#0072B2", "#D55E00", "#CC79A7", "#999999",
    "#F0E442", "#E69F00", "#56B4E9", "#009E73", "#0072B2", "#D55E00", "#CC79A7", "#999999",
];

/// Colour for uncategorized markers.
pub const FALLBACK_COLOR: &str = "black";

/// Category to colour mapping for one rendering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorAssignment {
    order: Vec<String>,
    lookup: BTreeMap<String, &'static str>,
}

impl ColorAssignment {
    /// Builds the assignment from category values in observation order.
    /// `None` values are skipped.
    pub fn from_categories<'a>(categories: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut assignment = Self::default();

        for category in categories.into_iter().flatten() {
            if assignment.lookup.contains_key(category) {
                continue;
            }
            let color = PALETTE[assignment.order.len() % PALETTE.len()];
            assignment.lookup.insert(category.to_string(), color);
            assignment.order.push(category.to_string());
        }

        if assignment.order.len() > PALETTE.len() {
            log::warn!(
                "{} collision types for {} palette colours, colours will repeat",
                assignment.order.len(),
                PALETTE.len()
            );
        }

        assignment
    }

    /// Builds the assignment from the records' collision types.
    #[must_use]
    pub fn from_records(records: &[NormalizedRecord]) -> Self {
        Self::from_categories(records.iter().map(|r| r.collision_type.as_deref()))
    }

    /// Colour for `category`, or [`FALLBACK_COLOR`] if it was never observed.
    #[must_use]
    pub fn color_for(&self, category: Option<&str>) -> &'static str {
        category
            .and_then(|c| self.lookup.get(c).copied())
            .unwrap_or(FALLBACK_COLOR)
    }

    /// Observed categories in order of first appearance.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of distinct categories observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no category was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(values: &[Option<&str>]) -> ColorAssignment {
        ColorAssignment::from_categories(values.iter().copied())
    }

    #[test]
    fn deterministic_across_runs() {
        let first = build(&[Some("A"), Some("B"), Some("A"), Some("C")]);
        let second = build(&[Some("A"), Some("B"), Some("A"), Some("C")]);
        assert_eq!(first, second);
        assert_eq!(first.color_for(Some("A")), PALETTE[0]);
        assert_eq!(first.color_for(Some("B")), PALETTE[1]);
        assert_eq!(first.color_for(Some("C")), PALETTE[2]);
        assert_eq!(first.len(), 3);
        assert!(!first.is_empty());
        assert!(build(&[None, None]).is_empty());
    }

    #[test]
    fn unseen_and_missing_categories_get_fallback() {
        let colors = build(&[Some("A"), Some("B"), Some("A"), Some("C")]);
        assert_eq!(colors.color_for(Some("D")), FALLBACK_COLOR);
        assert_eq!(colors.color_for(None), FALLBACK_COLOR);
        assert!(!PALETTE.contains(&FALLBACK_COLOR));
    }

    #[test]
    fn nulls_do_not_take_palette_slots() {
        let colors = build(&[None, Some("Angle"), None, Some("Sideswipe")]);
        assert_eq!(colors.color_for(Some("Angle")), PALETTE[0]);
        assert_eq!(colors.color_for(Some("Sideswipe")), PALETTE[1]);
    }

    #[test]
    fn wraps_around_past_palette_length() {
        let names: Vec<String> = (0..=PALETTE.len()).map(|i| format!("type {i}")).collect();
        let colors = ColorAssignment::from_categories(names.iter().map(|n| Some(n.as_str())));
        assert_eq!(colors.color_for(Some("type 16")), PALETTE[0]);
        assert_eq!(colors.categories().count(), 17);
    }

    #[test]
    fn categories_keep_first_appearance_order() {
        let colors = build(&[Some("Rear End"), Some("Angle"), Some("Rear End")]);
        let names: Vec<&str> = colors.categories().collect();
        assert_eq!(names, ["Rear End", "Angle"]);
    }
}
