// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Relayer Store Module 🕸️
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! Confessions and votes live behind [`ConfessionStore`], with an in-memory
//! and a [Sled](https://sled.rs) backend. Short lived authentication and
//! anti-replay state lives in process-local maps ([`TtlStore`],
//! [`PaymentClaims`]).
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

use confession_relayer_types::{Category, Confession, VoteType};
use confession_relayer_utils::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Single-use set of consumed payment transaction hashes.
pub mod claims;
/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;
/// Expiring key-value maps for nonces, sessions and the like.
pub mod ttl;

pub use claims::PaymentClaims;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;
/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
pub use ttl::{MemTtlStore, TtlStore};

/// Largest page a listing may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Ordering for confession listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Latest,
    /// Highest likes minus dislikes first, newest on ties.
    Top,
}

/// Which confessions a listing returns.
#[derive(Debug, Clone)]
pub struct ConfessionFilter {
    /// Only this category, when set.
    pub category: Option<Category>,
    /// Moderators can see hidden confessions.
    pub include_hidden: bool,
    /// Ordering.
    pub sort: SortOrder,
    /// Page size, capped at [`MAX_PAGE_SIZE`].
    pub limit: usize,
    /// Items to skip.
    pub offset: usize,
}

impl Default for ConfessionFilter {
    fn default() -> Self {
        Self {
            category: None,
            include_hidden: false,
            sort: SortOrder::Latest,
            limit: 50,
            offset: 0,
        }
    }
}

impl ConfessionFilter {
    /// Applies category, visibility, ordering and paging to `items`.
    pub fn apply(&self, items: impl IntoIterator<Item = Confession>) -> Vec<Confession> {
        let mut items: Vec<_> = items
            .into_iter()
            .filter(|c| self.include_hidden || !c.is_hidden)
            .filter(|c| self.category.map_or(true, |cat| c.category == cat))
            .collect();
        match self.sort {
            SortOrder::Latest => {
                items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp))
            }
            SortOrder::Top => items.sort_by(|a, b| {
                b.score()
                    .cmp(&a.score())
                    .then_with(|| b.timestamp.cmp(&a.timestamp))
            }),
        }
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit.min(MAX_PAGE_SIZE))
            .collect()
    }
}

/// Aggregates over visible confessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfessionStats {
    /// Visible confessions.
    pub total_confessions: u64,
    /// Visible confessions anchored on chain.
    pub anchored_confessions: u64,
    /// Sum of likes.
    pub total_likes: u64,
    /// Sum of dislikes.
    pub total_dislikes: u64,
    /// Confessions per category.
    pub category_breakdown: BTreeMap<Category, u64>,
    /// Best scored confessions.
    pub top_confessions: Vec<Confession>,
}

impl ConfessionStats {
    /// Computes the stats of all non-hidden `items`, keeping the `top` best.
    pub fn collect(items: impl IntoIterator<Item = Confession>, top: usize) -> Self {
        let mut stats = Self::default();
        let mut visible = Vec::new();
        for c in items.into_iter().filter(|c| !c.is_hidden) {
            stats.total_confessions += 1;
            stats.anchored_confessions += u64::from(c.is_anchored);
            stats.total_likes += c.likes;
            stats.total_dislikes += c.dislikes;
            *stats.category_breakdown.entry(c.category).or_default() += 1;
            visible.push(c);
        }
        stats.top_confessions = ConfessionFilter {
            sort: SortOrder::Top,
            limit: top,
            ..Default::default()
        }
        .apply(visible);
        stats
    }
}

/// Durable storage for confessions and their votes.
///
/// Vote mutations update the confession's counters in the same critical
/// section, so `likes`/`dislikes` always equal the number of votes of each type.
#[async_trait::async_trait]
pub trait ConfessionStore: Debug + Send + Sync {
    /// Lists confessions matching `filter`.
    async fn list_confessions(
        &self,
        filter: &ConfessionFilter,
    ) -> Result<Vec<Confession>>;

    /// Fetches one confession.
    async fn get_confession(&self, id: Uuid) -> Result<Option<Confession>>;

    /// Stores a new confession. Fails when the id already exists.
    async fn insert_confession(&self, confession: &Confession) -> Result<()>;

    /// Sets the moderation flag, returning the updated confession.
    async fn set_hidden(
        &self,
        id: Uuid,
        hidden: bool,
    ) -> Result<Option<Confession>>;

    /// The visitor's active vote on a confession.
    async fn get_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> Result<Option<VoteType>>;

    /// The visitor's active votes on several confessions.
    async fn votes_for(
        &self,
        visitor_id: &str,
        confession_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteType>> {
        let mut out = HashMap::new();
        for id in confession_ids {
            if let Some(v) = self.get_vote(*id, visitor_id).await? {
                out.insert(*id, v);
            }
        }
        Ok(out)
    }

    /// Creates, switches or (same type) keeps the visitor's vote.
    ///
    /// Returns `None` when the confession does not exist.
    async fn cast_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        vote_type: VoteType,
    ) -> Result<Option<Confession>>;

    /// Deletes the visitor's vote if any.
    ///
    /// Returns `None` when the confession does not exist.
    async fn remove_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> Result<Option<Confession>>;

    /// Aggregates over visible confessions.
    async fn confession_stats(&self, top: usize) -> Result<ConfessionStats>;
}

#[async_trait::async_trait]
impl<S: ConfessionStore + ?Sized> ConfessionStore for Arc<S> {
    async fn list_confessions(
        &self,
        filter: &ConfessionFilter,
    ) -> Result<Vec<Confession>> {
        S::list_confessions(self, filter).await
    }

    async fn get_confession(&self, id: Uuid) -> Result<Option<Confession>> {
        S::get_confession(self, id).await
    }

    async fn insert_confession(&self, confession: &Confession) -> Result<()> {
        S::insert_confession(self, confession).await
    }

    async fn set_hidden(
        &self,
        id: Uuid,
        hidden: bool,
    ) -> Result<Option<Confession>> {
        S::set_hidden(self, id, hidden).await
    }

    async fn get_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> Result<Option<VoteType>> {
        S::get_vote(self, confession_id, visitor_id).await
    }

    async fn votes_for(
        &self,
        visitor_id: &str,
        confession_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VoteType>> {
        S::votes_for(self, visitor_id, confession_ids).await
    }

    async fn cast_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        vote_type: VoteType,
    ) -> Result<Option<Confession>> {
        S::cast_vote(self, confession_id, visitor_id, vote_type).await
    }

    async fn remove_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> Result<Option<Confession>> {
        S::remove_vote(self, confession_id, visitor_id).await
    }

    async fn confession_stats(&self, top: usize) -> Result<ConfessionStats> {
        S::confession_stats(self, top).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // builds confessions with strictly increasing timestamps.
    fn at(secs: i64, category: Category, likes: u64) -> Confession {
        let mut c = Confession::anchored("text", category, "0x01");
        c.timestamp += chrono::Duration::seconds(secs);
        c.likes = likes;
        c
    }

    #[test]
    fn filter_orders_and_pages() {
        let items = vec![
            at(1, Category::Love, 5),
            at(2, Category::Funny, 0),
            at(3, Category::Love, 2),
        ];
        let latest = ConfessionFilter::default().apply(items.clone());
        assert_eq!(latest[0].id, items[2].id);

        let top = ConfessionFilter {
            sort: SortOrder::Top,
            ..Default::default()
        }
        .apply(items.clone());
        assert_eq!(top[0].id, items[0].id);

        let love = ConfessionFilter {
            category: Some(Category::Love),
            offset: 1,
            ..Default::default()
        }
        .apply(items.clone());
        assert_eq!(love.len(), 1);
        assert_eq!(love[0].id, items[0].id);
    }

    #[test]
    fn hidden_items_are_excluded_unless_requested() {
        let mut hidden = at(1, Category::Secret, 0);
        hidden.is_hidden = true;
        let items = vec![hidden, at(2, Category::Secret, 0)];
        assert_eq!(ConfessionFilter::default().apply(items.clone()).len(), 1);
        let all = ConfessionFilter {
            include_hidden: true,
            ..Default::default()
        };
        assert_eq!(all.apply(items).len(), 2);
    }

    #[test]
    fn stats_skip_hidden() {
        let mut hidden = at(1, Category::Secret, 9);
        hidden.is_hidden = true;
        let stats = ConfessionStats::collect(
            vec![hidden, at(2, Category::Love, 3), at(3, Category::Love, 1)],
            5,
        );
        assert_eq!(stats.total_confessions, 2);
        assert_eq!(stats.total_likes, 4);
        assert_eq!(stats.category_breakdown.get(&Category::Love), Some(&2));
        assert_eq!(stats.top_confessions[0].likes, 3);
    }
}
