use std::collections::BTreeSet;

use crate::feature::feature::{Category, Feature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategorySelection {
    #[default]
    All,
    Only(Category),
}

impl CategorySelection {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategorySelection::All => true,
            CategorySelection::Only(selected) => *selected == category,
        }
    }
}

/// User-controlled filter inputs. Read on every redraw, mutated only by user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub selected_category: CategorySelection,
    search_query: String,
    pub visible_categories: BTreeSet<Category>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            selected_category: CategorySelection::All,
            search_query: String::new(),
            visible_categories: Category::ALL.into_iter().collect(),
        }
    }
}

impl FilterState {
    /// The query is stored case-folded so matching only folds the feature text.
    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.to_lowercase();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Flip a per-category toggle. Returns whether the category is visible afterwards.
    pub fn toggle_category(&mut self, category: Category) -> bool {
        if !self.visible_categories.remove(&category) {
            self.visible_categories.insert(category);
            return true;
        }
        false
    }

    pub fn is_visible(&self, feature: &Feature) -> bool {
        self.selected_category.matches(feature.category)
            && self.visible_categories.contains(&feature.category)
            && (self.search_query.is_empty()
                || feature.title.to_lowercase().contains(&self.search_query)
                || feature.description.to_lowercase().contains(&self.search_query))
    }
}

/// Visible subset of `features` under `state`, in store order.
pub fn compute_visible<'a>(features: &'a [Feature], state: &FilterState) -> Vec<&'a Feature> {
    features
        .iter()
        .filter(|feature| state.is_visible(feature))
        .collect()
}
