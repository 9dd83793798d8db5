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

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of confession categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    /// Love
    Love,
    /// Regret
    Regret,
    /// Secret
    Secret,
    /// Funny
    Funny,
    /// Wisdom
    Wisdom,
    /// Crypto
    Crypto,
    /// Other
    Other,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 7] = [
        Category::Love,
        Category::Regret,
        Category::Secret,
        Category::Funny,
        Category::Wisdom,
        Category::Crypto,
        Category::Other,
    ];

    /// The canonical name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Love => "Love",
            Category::Regret => "Regret",
            Category::Secret => "Secret",
            Category::Funny => "Funny",
            Category::Wisdom => "Wisdom",
            Category::Crypto => "Crypto",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

/// A stored confession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confession {
    /// Unique id.
    pub id: Uuid,
    /// Text exactly as submitted.
    pub original_text: String,
    /// Text shown to readers.
    pub display_text: String,
    /// Category.
    pub category: Category,
    /// 0 (negative) to 100 (positive), 50 is neutral.
    pub sentiment_score: u8,
    /// Number of active like votes.
    pub likes: u64,
    /// Number of active dislike votes.
    pub dislikes: u64,
    /// Whether the content hash is stored on chain.
    pub is_anchored: bool,
    /// Relayer transaction that anchored the content hash.
    pub tx_hash: Option<String>,
    /// Moderation flag.
    pub is_hidden: bool,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Always `None` for relayed confessions.
    pub author_id: Option<String>,
}

impl Confession {
    /// Builds a confession whose content hash was anchored by the relayer in `tx_hash`.
    pub fn anchored(
        text: impl Into<String>,
        category: Category,
        tx_hash: impl Into<String>,
    ) -> Self {
        let original_text = text.into();
        let display_text = original_text.trim().to_owned();
        let sentiment_score = crate::sentiment::score(&display_text);
        Self {
            id: Uuid::new_v4(),
            original_text,
            display_text,
            category,
            sentiment_score,
            likes: 0,
            dislikes: 0,
            is_anchored: true,
            tx_hash: Some(tx_hash.into()),
            is_hidden: false,
            timestamp: Utc::now(),
            author_id: None,
        }
    }

    /// likes minus dislikes, used by the `top` ordering.
    pub fn score(&self) -> i64 {
        self.likes as i64 - self.dislikes as i64
    }

    /// Moves one vote of `from` (if any) to `to` (if any), keeping counters non-negative.
    pub fn apply_vote_change(
        &mut self,
        from: Option<VoteType>,
        to: Option<VoteType>,
    ) {
        match from {
            Some(VoteType::Like) => self.likes = self.likes.saturating_sub(1),
            Some(VoteType::Dislike) => {
                self.dislikes = self.dislikes.saturating_sub(1)
            }
            None => {}
        }
        match to {
            Some(VoteType::Like) => self.likes += 1,
            Some(VoteType::Dislike) => self.dislikes += 1,
            None => {}
        }
    }
}

/// Kind of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    /// Like
    Like,
    /// Dislike
    Dislike,
}

/// A visitor's vote on a confession. At most one per (confession, visitor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Unique id.
    pub id: Uuid,
    /// The confession voted on.
    pub confession_id: Uuid,
    /// Anonymous, client generated visitor id.
    pub visitor_id: String,
    /// Like or dislike.
    pub vote_type: VoteType,
}

impl Vote {
    /// Creates a fresh vote.
    pub fn new(
        confession_id: Uuid,
        visitor_id: impl Into<String>,
        vote_type: VoteType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            confession_id,
            visitor_id: visitor_id.into(),
            vote_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>(), Ok(c));
        }
        assert!("love".parse::<Category>().is_err());
    }

    #[test]
    fn confession_serializes_camel_case() {
        let c = Confession::anchored("gm", Category::Wisdom, "0xabc");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["originalText"], "gm");
        assert_eq!(json["isAnchored"], true);
        assert_eq!(json["txHash"], "0xabc");
        assert_eq!(json["category"], "Wisdom");
        assert!(json["authorId"].is_null());
    }

    #[test]
    fn switching_a_vote_moves_one_count() {
        let mut c = Confession::anchored("gm", Category::Wisdom, "0xabc");
        c.apply_vote_change(None, Some(VoteType::Like));
        c.apply_vote_change(Some(VoteType::Like), Some(VoteType::Dislike));
        assert_eq!((c.likes, c.dislikes), (0, 1));
        c.apply_vote_change(Some(VoteType::Dislike), None);
        assert_eq!((c.likes, c.dislikes), (0, 0));
    }

    #[test]
    fn vote_type_is_lowercase() {
        assert_eq!(
            serde_json::to_value(VoteType::Dislike).unwrap(),
            serde_json::json!("dislike")
        );
    }
}
