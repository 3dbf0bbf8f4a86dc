// 🏷️ Category Entity - Read-only lookup table for a run
//
// Categories are loaded once from the record store before any row is
// transformed. The table is never mutated afterwards.
//
// Identity: id (assigned by the store)
// Values: name, category_type

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CATEGORY TYPE
// ============================================================================

/// Direction of money flow. Also the type of a migrated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Money coming in
    Income,

    /// Money going out
    Expense,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Income => "income",
            CategoryType::Expense => "expense",
        }
    }

    /// Two-way classification: the income marker means income, anything else expense
    pub fn classify(label: &str, income_marker: &str) -> CategoryType {
        if label == income_marker {
            CategoryType::Income
        } else {
            CategoryType::Expense
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(CategoryType::Income),
            "expense" => Ok(CategoryType::Expense),
            other => bail!("unknown category type: {}", other),
        }
    }
}

// ============================================================================
// CATEGORY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
}

impl Category {
    pub fn new(id: &str, name: &str, category_type: CategoryType) -> Self {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            category_type,
        }
    }
}

// ============================================================================
// CATEGORY TABLE
// ============================================================================

/// Snapshot of the store's categories, indexed by name.
///
/// Store order is preserved: "first category of a type" means first as loaded.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    categories: Vec<Category>,
    by_name: HashMap<String, Vec<usize>>,
}

impl CategoryTable {
    pub fn new(categories: Vec<Category>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, category) in categories.iter().enumerate() {
            by_name.entry(category.name.clone()).or_default().push(idx);
        }

        CategoryTable {
            categories,
            by_name,
        }
    }

    /// Find by exact name, preferring a category of `category_type`.
    ///
    /// A same-named category of the other type is accepted when no typed match exists.
    pub fn find(&self, name: &str, category_type: CategoryType) -> Option<&Category> {
        let indices = self.by_name.get(name)?;

        indices
            .iter()
            .map(|&idx| &self.categories[idx])
            .find(|c| c.category_type == category_type)
            .or_else(|| indices.first().map(|&idx| &self.categories[idx]))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn first_of_type(&self, category_type: CategoryType) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.category_type == category_type)
    }

    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> CategoryTable {
        CategoryTable::new(vec![
            Category::new("c-food", "식비", CategoryType::Expense),
            Category::new("c-util", "공과금", CategoryType::Expense),
            Category::new("c-salary", "급여", CategoryType::Income),
            Category::new("c-etc-in", "기타", CategoryType::Income),
            Category::new("c-etc-out", "기타", CategoryType::Expense),
        ])
    }

    #[test]
    fn test_classify_is_two_way() {
        assert_eq!(CategoryType::classify("수입", "수입"), CategoryType::Income);
        assert_eq!(CategoryType::classify("지출", "수입"), CategoryType::Expense);
        assert_eq!(CategoryType::classify("", "수입"), CategoryType::Expense);
        assert_eq!(CategoryType::classify("anything", "수입"), CategoryType::Expense);
    }

    #[test]
    fn test_category_type_round_trip_through_str() {
        assert_eq!("income".parse::<CategoryType>().unwrap(), CategoryType::Income);
        assert_eq!(CategoryType::Expense.to_string(), "expense");
        assert!("transfer".parse::<CategoryType>().is_err());
    }

    #[test]
    fn test_find_prefers_matching_type() {
        let table = sample_table();

        assert_eq!(table.find("기타", CategoryType::Income).unwrap().id, "c-etc-in");
        assert_eq!(table.find("기타", CategoryType::Expense).unwrap().id, "c-etc-out");
    }

    #[test]
    fn test_find_accepts_other_type_when_no_typed_match() {
        let table = sample_table();

        // 급여 exists only as income
        assert_eq!(table.find("급여", CategoryType::Expense).unwrap().id, "c-salary");
        assert!(table.find("없는항목", CategoryType::Expense).is_none());
    }

    #[test]
    fn test_first_of_type_follows_store_order() {
        let table = sample_table();

        assert_eq!(table.first_of_type(CategoryType::Expense).unwrap().id, "c-food");
        assert_eq!(table.first_of_type(CategoryType::Income).unwrap().id, "c-salary");
        assert!(CategoryTable::default().first_of_type(CategoryType::Income).is_none());
    }

    #[test]
    fn test_find_by_id() {
        let table = sample_table();

        assert_eq!(table.find_by_id("c-util").unwrap().name, "공과금");
        assert!(table.find_by_id("missing").is_none());
        assert_eq!(table.len(), 5);
    }
}
