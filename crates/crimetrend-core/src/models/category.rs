use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upstream slug → display label, as published by police.uk.
const KNOWN_CATEGORIES: &[(&str, &str)] = &[
    ("anti-social-behaviour", "Anti-social behaviour"),
    ("bicycle-theft", "Bicycle theft"),
    ("burglary", "Burglary"),
    ("criminal-damage-arson", "Criminal damage and arson"),
    ("drugs", "Drugs"),
    ("other-theft", "Other theft"),
    ("possession-of-weapons", "Possession of weapons"),
    ("public-order", "Public order"),
    ("robbery", "Robbery"),
    ("shoplifting", "Shoplifting"),
    ("theft-from-the-person", "Theft from the person"),
    ("vehicle-crime", "Vehicle crime"),
    ("violent-crime", "Violence and sexual offences"),
    ("other-crime", "Other crime"),
];

/// Categories with enough volume to chart individually.
pub const TOP_CATEGORIES: &[&str] = &[
    "Anti-social behaviour",
    "Burglary",
    "Criminal damage and arson",
    "Other theft",
    "Public order",
    "Shoplifting",
    "Vehicle crime",
    "Violence and sexual offences",
];

const PERSON_CATEGORIES: &[&str] = &[
    "Violence and sexual offences",
    "Robbery",
    "Theft from the person",
    "Possession of weapons",
];

const PROPERTY_CATEGORIES: &[&str] = &[
    "Burglary",
    "Criminal damage and arson",
    "Vehicle crime",
    "Shoplifting",
    "Bicycle theft",
    "Other theft",
];

/// Map a raw category string to its display label.
///
/// The JSON API returns slugs (`anti-social-behaviour`) while older CSV
/// exports carry labels (`Anti-social behaviour`); both land in the same
/// column after this. Unknown slugs are de-slugged.
pub fn display_label(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((_, label)) = KNOWN_CATEGORIES.iter().find(|(slug, _)| *slug == raw) {
        return label.to_string();
    }
    if raw.contains(' ') || raw.chars().next().is_some_and(|c| c.is_uppercase()) {
        return raw.to_string();
    }

    let spaced = raw.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A named subset of categories, e.g. crimes against the person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub name: String,
    pub categories: Vec<String>,
}

impl CategoryGroup {
    pub fn new(name: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            name: name.into(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// Default partition: person-directed vs property-directed crime.
pub fn default_groups() -> Vec<CategoryGroup> {
    vec![
        CategoryGroup::new("Against the person", PERSON_CATEGORIES),
        CategoryGroup::new("Against property", PROPERTY_CATEGORIES),
    ]
}

/// Groups must not share a category, otherwise comparisons double count.
pub fn validate_groups(groups: &[CategoryGroup]) -> Result<(), ConfigError> {
    for (i, group) in groups.iter().enumerate() {
        if group.categories.is_empty() {
            return Err(ConfigError::EmptyGroup(group.name.clone()));
        }
        for other in &groups[i + 1..] {
            if let Some(shared) = group.categories.iter().find(|c| other.contains(c)) {
                return Err(ConfigError::OverlappingGroups {
                    first: group.name.clone(),
                    second: other.name.clone(),
                    category: shared.clone(),
                });
            }
        }
    }
    Ok(())
}
