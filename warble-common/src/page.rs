//! Offset pagination over fixed page sizes.
//!
//! Pages are 1-indexed. A listing has more pages iff the matching total
//! exceeds everything shown up to and including the current page.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::num::NonZeroU32;

pub const POSTS_PER_PAGE: u32 = 10;
pub const TAGS_PER_PAGE: u32 = 15;
pub const USERS_PER_PAGE: u32 = 20;
pub const MESSAGES_PER_PAGE: u32 = 20;
pub const POPULAR_TAGS: u32 = 3;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Page(NonZeroU32);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const FIRST: Page = Page(NonZeroU32::MIN);

    #[must_use]
    pub fn new(page: u32) -> Option<Self> {
        NonZeroU32::new(page).map(Self)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[must_use]
    pub fn window(self, page_size: u32) -> PageWindow {
        PageWindow {
            limit: i64::from(page_size),
            offset: i64::from(page_size) * (i64::from(self.get()) - 1),
        }
    }

    /// Whether a listing with `total` matching rows continues past this page.
    #[must_use]
    pub fn has_more(self, total: i64, page_size: u32) -> bool {
        total > i64::from(self.get()) * i64::from(page_size)
    }
}

/// One page of a listing.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Paged<T> {
    #[must_use]
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::FIRST
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u32::deserialize(deserializer)?;
        Page::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(0), &"a page number >= 1"))
    }
}

#[cfg(test)]
mod tests {
    use crate::page::{
        MESSAGES_PER_PAGE, POSTS_PER_PAGE, Page, PageWindow, TAGS_PER_PAGE, USERS_PER_PAGE,
    };

    #[test]
    fn window_is_offset_by_previous_pages() {
        assert_eq!(
            Page::FIRST.window(POSTS_PER_PAGE),
            PageWindow {
                limit: 10,
                offset: 0
            }
        );
        assert_eq!(
            Page::new(3).unwrap().window(TAGS_PER_PAGE),
            PageWindow {
                limit: 15,
                offset: 30
            }
        );
        assert_eq!(Page::new(2).unwrap().window(USERS_PER_PAGE).offset, 20);
    }

    #[test]
    fn has_more_iff_total_exceeds_shown() {
        for size in [POSTS_PER_PAGE, TAGS_PER_PAGE, USERS_PER_PAGE, MESSAGES_PER_PAGE] {
            let size_i64 = i64::from(size);
            let first = Page::FIRST;
            let second = Page::new(2).unwrap();
            let third = Page::new(3).unwrap();

            assert!(!first.has_more(0, size));
            assert!(!first.has_more(size_i64, size));
            assert!(first.has_more(size_i64 + 1, size));
            assert!(first.has_more(size_i64 * 3, size));

            assert!(!second.has_more(size_i64 * 2, size));
            assert!(second.has_more(size_i64 * 2 + 1, size));
            assert!(second.has_more(size_i64 * 3, size));
            assert!(!third.has_more(size_i64 * 3, size));
        }
    }

    #[test]
    fn page_zero_is_rejected() {
        assert!(Page::new(0).is_none());
        assert!(serde_json::from_str::<Page>("0").is_err());
        assert_eq!(serde_json::from_str::<Page>("4").unwrap().get(), 4);
        assert_eq!(Page::default(), Page::FIRST);
    }
}
