//! Pagination handling for NationBuilder list endpoints.
//!
//! Two schemes exist. Legacy pagination is page-number based (`page`, `per_page`,
//! `total_pages`, `total`). Token pagination follows opaque `next` / `prev` links
//! and only sends a `limit` plus the cursor parameters taken from those links.

use crate::config::DEFAULT_API_KEY_PARAMETER;
use crate::query::{Params, QueryCodec};
use serde_json::Value;
use std::collections::BTreeMap;

/// Response/dictionary key for the current page number (legacy).
pub const CURRENT_PAGE_NUMBER_KEY: &str = "page";
/// Response/dictionary key for the number of pages (legacy).
pub const NUMBER_OF_TOTAL_PAGES_KEY: &str = "total_pages";
/// Response/dictionary key for the page size (legacy).
pub const NUMBER_OF_ITEMS_PER_PAGE_KEY: &str = "per_page";
/// Response/dictionary key for the number of items (legacy).
pub const NUMBER_OF_TOTAL_ITEMS_KEY: &str = "total";
/// Response/dictionary key for the next-page link (token).
pub const NEXT_LINK_KEY: &str = "next";
/// Response/dictionary key for the previous-page link (token).
pub const PREVIOUS_LINK_KEY: &str = "prev";
/// Query/dictionary key for the page size (token).
pub const LIMIT_KEY: &str = "limit";
/// Dictionary key for the upstream total-available hint.
pub const NUMBER_OF_TOTAL_AVAILABLE_ITEMS_KEY: &str = "total_available";

/// Pagination scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationStyle {
    /// Page-number based paging.
    Legacy,
    /// Opaque next/previous link paging.
    #[default]
    Token,
}

/// Direction to move in when advancing a token-paginated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationDirection {
    /// Follow the `next` link.
    #[default]
    Forward,
    /// Follow the `prev` link.
    Backward,
}

/// Paging state for one list.
///
/// An instance belongs to whoever holds it. The client clones what it is given and
/// hands back a fresh instance with every list result; the only in-place mutation
/// is [`PaginationInfo::update_current_page_number`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationInfo {
    style: PaginationStyle,
    current_page_number: u32,
    number_of_total_pages: u32,
    number_of_items_per_page: u32,
    number_of_total_items: u32,
    number_of_total_available_items: Option<u32>,
    next_link: Option<String>,
    previous_link: Option<String>,
    direction: PaginationDirection,
    cursor: Option<BTreeMap<String, String>>,
    api_key_parameter: String,
}

impl PaginationInfo {
    /// Creates an empty paging state for `style`, positioned at page 1.
    pub fn new(style: PaginationStyle) -> Self {
        Self {
            style,
            current_page_number: 1,
            number_of_total_pages: 0,
            number_of_items_per_page: 0,
            number_of_total_items: 0,
            number_of_total_available_items: None,
            next_link: None,
            previous_link: None,
            direction: PaginationDirection::Forward,
            cursor: None,
            api_key_parameter: DEFAULT_API_KEY_PARAMETER.to_string(),
        }
    }

    /// Creates legacy paging state for a page and page size.
    pub fn legacy(page: u32, per_page: u32) -> Self {
        let mut info = Self::new(PaginationStyle::Legacy);
        info.current_page_number = page.max(1);
        info.number_of_items_per_page = per_page;
        info
    }

    /// Creates token paging state with a page size.
    pub fn token(limit: u32) -> Self {
        let mut info = Self::new(PaginationStyle::Token);
        info.number_of_items_per_page = limit;
        info
    }

    /// Builds paging state from a raw key mapping.
    ///
    /// Numbers may be JSON numbers or numeric strings; anything missing or
    /// unparseable is 0.
    pub fn from_map(map: &Params, legacy: bool) -> Self {
        let number = |key: &str| map.get(key).and_then(value_to_u32).unwrap_or(0);

        if legacy {
            Self {
                style: PaginationStyle::Legacy,
                current_page_number: number(CURRENT_PAGE_NUMBER_KEY),
                number_of_total_pages: number(NUMBER_OF_TOTAL_PAGES_KEY),
                number_of_items_per_page: number(NUMBER_OF_ITEMS_PER_PAGE_KEY),
                number_of_total_items: number(NUMBER_OF_TOTAL_ITEMS_KEY),
                number_of_total_available_items: map
                    .get(NUMBER_OF_TOTAL_AVAILABLE_ITEMS_KEY)
                    .and_then(value_to_u32),
                ..Self::new(PaginationStyle::Legacy)
            }
        } else {
            let link = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
            };
            Self {
                style: PaginationStyle::Token,
                current_page_number: 0,
                number_of_items_per_page: number(LIMIT_KEY),
                number_of_total_available_items: map
                    .get(NUMBER_OF_TOTAL_AVAILABLE_ITEMS_KEY)
                    .and_then(value_to_u32),
                next_link: link(NEXT_LINK_KEY),
                previous_link: link(PREVIOUS_LINK_KEY),
                ..Self::new(PaginationStyle::Token)
            }
        }
    }

    /// Builds the paging state that accompanies a list response.
    ///
    /// Fields the response omits are carried over from the state the request was
    /// made with. `api_key_parameter` names the credential query parameter, which
    /// is never carried into a cursor.
    pub(crate) fn from_response(
        json: &Params,
        style: PaginationStyle,
        request: Option<&PaginationInfo>,
        api_key_parameter: &str,
    ) -> Self {
        let mut info = Self::from_map(json, style == PaginationStyle::Legacy);
        info.api_key_parameter = api_key_parameter.to_string();
        let request = request.filter(|r| r.style == style);

        match style {
            PaginationStyle::Legacy => {
                if info.current_page_number == 0 {
                    info.current_page_number = request.map_or(1, |r| r.current_page_number.max(1));
                }
                if info.number_of_items_per_page == 0 {
                    info.number_of_items_per_page =
                        request.map_or(0, |r| r.number_of_items_per_page);
                }
            }
            PaginationStyle::Token => {
                if info.number_of_items_per_page == 0 {
                    info.number_of_items_per_page =
                        request.map_or(0, |r| r.number_of_items_per_page);
                }
                if let Some(request) = request {
                    info.direction = request.direction;
                }
            }
        }
        if info.number_of_total_available_items.is_none() {
            info.number_of_total_available_items =
                request.and_then(|r| r.number_of_total_available_items);
        }
        info
    }

    /// Serializes the paging state into a key mapping accepted by [`Self::from_map`].
    pub fn to_map(&self) -> Params {
        let mut map = Params::new();
        match self.style {
            PaginationStyle::Legacy => {
                map.insert(CURRENT_PAGE_NUMBER_KEY.into(), self.current_page_number.into());
                map.insert(NUMBER_OF_TOTAL_PAGES_KEY.into(), self.number_of_total_pages.into());
                map.insert(NUMBER_OF_ITEMS_PER_PAGE_KEY.into(), self.number_of_items_per_page.into());
                map.insert(NUMBER_OF_TOTAL_ITEMS_KEY.into(), self.number_of_total_items.into());
            }
            PaginationStyle::Token => {
                map.insert(LIMIT_KEY.into(), self.number_of_items_per_page.into());
                map.insert(
                    NEXT_LINK_KEY.into(),
                    self.next_link.clone().map_or(Value::Null, Value::String),
                );
                map.insert(
                    PREVIOUS_LINK_KEY.into(),
                    self.previous_link.clone().map_or(Value::Null, Value::String),
                );
            }
        }
        if let Some(total) = self.number_of_total_available_items {
            map.insert(NUMBER_OF_TOTAL_AVAILABLE_ITEMS_KEY.into(), total.into());
        }
        map
    }

    /// Gets the pagination scheme.
    pub fn style(&self) -> PaginationStyle {
        self.style
    }

    /// Returns true for page-number based paging.
    pub fn is_legacy(&self) -> bool {
        self.style == PaginationStyle::Legacy
    }

    /// Gets the 1-based current page number (legacy).
    pub fn current_page_number(&self) -> u32 {
        self.current_page_number
    }

    /// Sets the current page number (legacy).
    pub fn set_current_page_number(&mut self, page: u32) {
        self.current_page_number = page;
    }

    /// Gets the number of pages (legacy).
    pub fn number_of_total_pages(&self) -> u32 {
        self.number_of_total_pages
    }

    /// Gets the page size.
    pub fn number_of_items_per_page(&self) -> u32 {
        self.number_of_items_per_page
    }

    /// Sets the page size.
    pub fn set_number_of_items_per_page(&mut self, per_page: u32) {
        self.number_of_items_per_page = per_page;
    }

    /// Gets the number of items across all pages (legacy).
    pub fn number_of_total_items(&self) -> u32 {
        self.number_of_total_items
    }

    /// Gets the upstream total-available hint.
    pub fn number_of_total_available_items(&self) -> Option<u32> {
        self.number_of_total_available_items
    }

    /// Sets the upstream total-available hint.
    pub fn set_number_of_total_available_items(&mut self, total: Option<u32>) {
        self.number_of_total_available_items = total;
    }

    /// Gets the next-page link (token).
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Gets the previous-page link (token).
    pub fn previous_link(&self) -> Option<&str> {
        self.previous_link.as_deref()
    }

    /// Gets the direction used by the next advance (token).
    pub fn direction(&self) -> PaginationDirection {
        self.direction
    }

    /// Sets the direction used by the next advance (token).
    pub fn set_direction(&mut self, direction: PaginationDirection) {
        self.direction = direction;
    }

    /// Index of the first item on `page_number`.
    pub fn index_of_first_item(&self, page_number: u32) -> u32 {
        if page_number <= 1 {
            return 0;
        }
        (page_number - 1).saturating_mul(self.number_of_items_per_page)
    }

    /// Number of items on `page_number`, never negative.
    pub fn item_count(&self, page_number: u32) -> u32 {
        let remaining = self
            .number_of_total_items
            .saturating_sub(self.index_of_first_item(page_number));
        remaining.min(self.number_of_items_per_page)
    }

    /// Returns true when there is nothing after the current page.
    pub fn is_last_page(&self) -> bool {
        match self.style {
            PaginationStyle::Legacy => {
                self.number_of_total_pages == 0
                    || self.current_page_number >= self.number_of_total_pages
            }
            PaginationStyle::Token => self.next_link.is_none(),
        }
    }

    /// Returns true when a page exists in the current direction.
    pub fn has_page_in_direction(&self) -> bool {
        match (self.style, self.direction) {
            (PaginationStyle::Legacy, PaginationDirection::Forward) => !self.is_last_page(),
            (PaginationStyle::Legacy, PaginationDirection::Backward) => self.current_page_number > 1,
            (PaginationStyle::Token, PaginationDirection::Forward) => self.next_link.is_some(),
            (PaginationStyle::Token, PaginationDirection::Backward) => self.previous_link.is_some(),
        }
    }

    /// Moves to the next page.
    ///
    /// Legacy paging increments the page number, stopping one past the last page.
    /// Token paging has no counter: it selects the cursor of the link in the current
    /// direction, which [`Self::query_parameters`] then emits.
    pub fn update_current_page_number(&mut self) {
        match self.style {
            PaginationStyle::Legacy => {
                if self.current_page_number <= self.number_of_total_pages {
                    self.current_page_number += 1;
                }
            }
            PaginationStyle::Token => {
                let link = match self.direction {
                    PaginationDirection::Forward => self.next_link.as_deref(),
                    PaginationDirection::Backward => self.previous_link.as_deref(),
                };
                self.cursor = link.map(|link| cursor_from_link(link, &self.api_key_parameter));
            }
        }
    }

    /// Query parameters that request the current page.
    pub fn query_parameters(&self) -> Params {
        let mut params = Params::new();
        match self.style {
            PaginationStyle::Legacy => {
                params.insert(CURRENT_PAGE_NUMBER_KEY.into(), self.current_page_number.max(1).into());
                if self.number_of_items_per_page > 0 {
                    params.insert(NUMBER_OF_ITEMS_PER_PAGE_KEY.into(), self.number_of_items_per_page.into());
                }
            }
            PaginationStyle::Token => {
                if self.number_of_items_per_page > 0 {
                    params.insert(LIMIT_KEY.into(), self.number_of_items_per_page.into());
                }
                if let Some(cursor) = &self.cursor {
                    for (key, value) in cursor {
                        params.insert(key.clone(), Value::String(value.clone()));
                    }
                }
            }
        }
        params
    }
}

impl Default for PaginationInfo {
    fn default() -> Self {
        Self::new(PaginationStyle::default())
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn cursor_from_link(link: &str, api_key_parameter: &str) -> BTreeMap<String, String> {
    let query = link.split_once('?').map_or("", |(_, q)| q);
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    QueryCodec::decode(query)
        .into_iter()
        .filter(|(key, _)| key != LIMIT_KEY && key != api_key_parameter)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_item_math() {
        let info = PaginationInfo::from_map(
            &map(json!({"page": 1, "per_page": 20, "total": 45, "total_pages": 3})),
            true,
        );

        assert_eq!(info.index_of_first_item(0), 0);
        assert_eq!(info.index_of_first_item(1), 0);
        assert_eq!(info.index_of_first_item(3), 40);
        assert_eq!(info.item_count(1), 20);
        assert_eq!(info.item_count(3), 5);
        assert_eq!(info.item_count(4), 0);
    }

    #[test]
    fn test_legacy_advances_to_last_page() {
        let mut info = PaginationInfo::from_map(
            &map(json!({"page": 1, "per_page": 10, "total_pages": 5})),
            true,
        );

        let mut advances = 0;
        while !info.is_last_page() {
            info.update_current_page_number();
            advances += 1;
        }
        assert_eq!(advances, 4);
        assert_eq!(info.current_page_number(), 5);

        for _ in 0..10 {
            info.update_current_page_number();
        }
        assert_eq!(info.current_page_number(), 6);
        assert!(info.is_last_page());
    }

    #[test]
    fn test_legacy_zero_pages_is_last() {
        let info = PaginationInfo::from_map(&map(json!({})), true);
        assert_eq!(info.current_page_number(), 0);
        assert!(info.is_last_page());
    }

    #[test]
    fn test_string_numbers_and_garbage() {
        let info = PaginationInfo::from_map(
            &map(json!({"page": "2", "per_page": "abc", "total_pages": -3})),
            true,
        );
        assert_eq!(info.current_page_number(), 2);
        assert_eq!(info.number_of_items_per_page(), 0);
        assert_eq!(info.number_of_total_pages(), 0);
    }

    #[test]
    fn test_legacy_query_parameters() {
        let info = PaginationInfo::legacy(3, 25);
        assert_eq!(info.query_parameters(), map(json!({"page": 3, "per_page": 25})));
    }

    #[test]
    fn test_token_mode_cursor() {
        let mut info = PaginationInfo::from_map(
            &map(json!({
                "next": "/api/v1/people?__nonce=abc&__token=tok%2B1&limit=10&access_token=secret",
                "prev": null
            })),
            false,
        );
        info.set_number_of_items_per_page(10);

        assert!(!info.is_last_page());
        assert_eq!(info.query_parameters(), map(json!({"limit": 10})));

        info.update_current_page_number();
        assert_eq!(
            info.query_parameters(),
            map(json!({"limit": 10, "__nonce": "abc", "__token": "tok+1"}))
        );
    }

    #[test]
    fn test_token_mode_backward_without_link() {
        let mut info = PaginationInfo::from_map(&map(json!({"next": "/x?__token=n"})), false);
        info.set_direction(PaginationDirection::Backward);
        assert!(!info.has_page_in_direction());

        info.update_current_page_number();
        assert!(!info.query_parameters().contains_key("__token"));
    }

    #[test]
    fn test_token_mode_last_page() {
        let info = PaginationInfo::from_map(&map(json!({"next": "", "prev": "/x?__token=p"})), false);
        assert!(info.is_last_page());
        assert_eq!(info.previous_link(), Some("/x?__token=p"));
    }

    #[test]
    fn test_to_map_round_trip() {
        let legacy = PaginationInfo::from_map(
            &map(json!({"page": 2, "per_page": 10, "total_pages": 5, "total": 48})),
            true,
        );
        assert_eq!(PaginationInfo::from_map(&legacy.to_map(), true), legacy);

        let token = PaginationInfo::from_map(&map(json!({"next": "/n?__token=1", "limit": 5})), false);
        assert_eq!(PaginationInfo::from_map(&token.to_map(), false), token);
    }

    #[test]
    fn test_from_response_carries_request_state() {
        let request = PaginationInfo::legacy(2, 10);
        let info = PaginationInfo::from_response(
            &map(json!({"results": [], "total_pages": 5})),
            PaginationStyle::Legacy,
            Some(&request),
            DEFAULT_API_KEY_PARAMETER,
        );
        assert_eq!(info.current_page_number(), 2);
        assert_eq!(info.number_of_items_per_page(), 10);
        assert!(!info.is_last_page());
    }

    #[test]
    fn test_cursor_drops_configured_credential_parameter() {
        let mut info = PaginationInfo::from_response(
            &map(json!({
                "results": [],
                "next": "/api/v1/people?__token=abc&api_token=secret&limit=10"
            })),
            PaginationStyle::Token,
            Some(&PaginationInfo::token(10)),
            "api_token",
        );
        info.update_current_page_number();

        assert_eq!(
            info.query_parameters(),
            map(json!({"limit": 10, "__token": "abc"}))
        );
    }
}
