//! Product categories. These ship with the binary and are not editable at runtime.

use serde::Serialize;

/// A product category.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub sort_order: i32,
}

pub static CATEGORIES: &[Category] = &[
    Category {
        id: "agents",
        name: "净水药剂",
        description: "高效絮凝，快速沉淀",
        sort_order: 1,
    },
    Category {
        id: "carbon",
        name: "活性炭系列",
        description: "强力吸附，深度净化",
        sort_order: 2,
    },
    Category {
        id: "filter-media",
        name: "滤料系列",
        description: "优质滤料，层层过滤",
        sort_order: 3,
    },
    Category {
        id: "fillers",
        name: "填料系列",
        description: "环保填料，提高效率",
        sort_order: 4,
    },
];

/// All categories ordered by `sort_order`.
pub fn sorted_categories() -> Vec<&'static Category> {
    let mut categories: Vec<&'static Category> = CATEGORIES.iter().collect();
    categories.sort_by_key(|c| c.sort_order);
    categories
}

pub fn find_category(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}
