//! Paged listing of the creator's courses.

use shared::protocol::{CourseListing, CourseSummary};
use tracing::debug;

use crate::{error::ClientResult, CreatorApi};

#[derive(Debug, Clone, PartialEq)]
pub struct CoursePager {
    skip: u64,
    limit: u64,
    total: u64,
    courses: Vec<CourseSummary>,
}

impl CoursePager {
    pub fn new(limit: u64) -> Self {
        Self {
            skip: 0,
            limit: limit.max(1),
            total: 0,
            courses: Vec::new(),
        }
    }

    /// Positions the cursor before the first load.
    pub fn starting_at(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn courses(&self) -> &[CourseSummary] {
        &self.courses
    }

    /// Fetches the current page and applies it.
    pub async fn load(&mut self, api: &dyn CreatorApi) -> ClientResult<()> {
        let listing = api.list_courses(self.skip, self.limit).await?;
        self.apply(listing);
        debug!(skip = self.skip, limit = self.limit, total = self.total, "course page loaded");
        Ok(())
    }

    pub fn apply(&mut self, listing: CourseListing) {
        match listing {
            CourseListing::Page(page) => {
                self.total = page.total;
                self.skip = page.skip;
                if let Some(limit) = page.limit.filter(|limit| *limit > 0) {
                    self.limit = limit;
                }
                self.courses = page.items;
            }
            // No total on the wire; count what precedes this page.
            CourseListing::Bare(items) => {
                self.total = self.skip + items.len() as u64;
                self.courses = items;
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.skip + self.limit < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.skip > 0
    }

    /// Moves the cursor forward. Returns `false` on the last page.
    pub fn next_page(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.skip += self.limit;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.skip = self.skip.saturating_sub(self.limit);
        true
    }

    pub fn set_page_size(&mut self, limit: u64) {
        self.limit = limit.max(1);
        self.skip = 0;
    }

    /// One-based index of the first course on the page, for "showing x-y of z".
    pub fn showing_from(&self) -> u64 {
        if self.courses.is_empty() {
            0
        } else {
            self.skip + 1
        }
    }

    pub fn showing_to(&self) -> u64 {
        if self.courses.is_empty() {
            return 0;
        }
        let total = if self.total > 0 {
            self.total
        } else {
            self.courses.len() as u64
        };
        (self.skip + self.limit).min(total)
    }
}
