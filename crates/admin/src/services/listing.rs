//! Search, pagination, and grouping for the list pages.

use std::collections::BTreeMap;

use mung_core::{Message, Persona, PhishingCase, PhishingCategory, SendMessageResponse};

/// Page sizes offered on paginated tables.
pub const PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];

/// Page size used when none (or an unsupported one) is requested.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Description shown for cases whose category code is not in the catalog.
pub const UNKNOWN_CATEGORY: &str = "unknown category";

/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, always within `1..=total_pages`.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Accept only the offered page sizes.
#[must_use]
pub fn page_size_or_default(requested: Option<usize>) -> usize {
    requested
        .filter(|size| PAGE_SIZES.contains(size))
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Slice `items` into the requested page, clamping the page number.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.unwrap_or(1).clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total_pages,
        total_items,
    }
}

/// Normalize a search box value: trimmed and lowercased, `None` when blank.
#[must_use]
pub fn search_needle(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

/// Keep items matching the needle, or everything when there is none.
pub fn filter_by<T>(items: Vec<T>, needle: Option<&str>, matches: impl Fn(&T, &str) -> bool) -> Vec<T> {
    match needle {
        Some(needle) => items.into_iter().filter(|item| matches(item, needle)).collect(),
        None => items,
    }
}

/// Case-insensitive persona name match.
#[must_use]
pub fn persona_matches(persona: &Persona, needle: &str) -> bool {
    persona.name.to_lowercase().contains(needle)
}

/// Cases under one category header.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseGroup {
    pub code: String,
    pub description: String,
    pub cases: Vec<PhishingCase>,
}

impl CaseGroup {
    #[must_use]
    pub fn count(&self) -> usize {
        self.cases.len()
    }
}

/// Group cases by category code in code order, newest (highest id) first
/// inside each group.
#[must_use]
pub fn group_cases(cases: Vec<PhishingCase>, categories: &[PhishingCategory]) -> Vec<CaseGroup> {
    let mut by_code: BTreeMap<String, Vec<PhishingCase>> = BTreeMap::new();
    for case in cases {
        by_code.entry(case.category_code.clone()).or_default().push(case);
    }

    by_code
        .into_iter()
        .map(|(code, mut cases)| {
            cases.sort_by_key(|case| std::cmp::Reverse(case.id));
            let description = categories
                .iter()
                .find(|category| category.code == code)
                .map_or_else(|| UNKNOWN_CATEGORY.to_string(), |c| c.description.clone());
            CaseGroup {
                code,
                description,
                cases,
            }
        })
        .collect()
}

/// Direction of the message list on the conversation page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl MessageOrder {
    /// `order=asc` shows oldest first; anything else shows newest first.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("asc") => Self::OldestFirst,
            _ => Self::NewestFirst,
        }
    }

    /// Query value of the opposite direction, for the toggle link.
    #[must_use]
    pub const fn toggled_query(self) -> &'static str {
        match self {
            Self::NewestFirst => "asc",
            Self::OldestFirst => "desc",
        }
    }

    /// Arrange messages that arrive oldest first from the backend.
    #[must_use]
    pub fn arrange(self, mut messages: Vec<Message>) -> Vec<Message> {
        if self == Self::NewestFirst {
            messages.reverse();
        }
        messages
    }
}

/// One-click messages offered under the chat.
///
/// An empty conversation offers the persona's starters; afterwards the
/// suggestions from the last reply are offered.
#[must_use]
pub fn quick_options(
    has_messages: bool,
    persona: &Persona,
    last_response: Option<&SendMessageResponse>,
) -> Vec<String> {
    if has_messages {
        last_response
            .map(|response| response.suggestions().to_vec())
            .unwrap_or_default()
    } else {
        persona.starters().to_vec()
    }
}
