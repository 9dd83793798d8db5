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

use std::collections::HashMap;
use std::sync::Arc;

use confession_relayer_types::{Confession, Vote, VoteType};
use confession_relayer_utils::Error;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ConfessionFilter, ConfessionStats, ConfessionStore};

#[derive(Default)]
struct MemState {
    confessions: HashMap<Uuid, Confession>,
    votes: HashMap<(Uuid, String), Vote>,
}

/// InMemoryStore is a store that keeps confessions and votes in memory.
///
/// Confessions and votes share one lock, so a vote and its counter update
/// are never observed apart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemState>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl InMemoryStore {
    fn change_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        to: Option<VoteType>,
    ) -> Option<Confession> {
        let mut guard = self.state.write();
        let MemState { confessions, votes } = &mut *guard;
        let confession = confessions.get_mut(&confession_id)?;
        let key = (confession_id, visitor_id.to_owned());
        let from = votes.get(&key).map(|v| v.vote_type);
        if from == to {
            return Some(confession.clone());
        }
        match to {
            Some(vote_type) => {
                votes
                    .entry(key)
                    .and_modify(|v| v.vote_type = vote_type)
                    .or_insert_with(|| {
                        Vote::new(confession_id, visitor_id, vote_type)
                    });
            }
            None => {
                votes.remove(&key);
            }
        }
        confession.apply_vote_change(from, to);
        Some(confession.clone())
    }
}

#[async_trait::async_trait]
impl ConfessionStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    async fn list_confessions(
        &self,
        filter: &ConfessionFilter,
    ) -> crate::Result<Vec<Confession>> {
        let guard = self.state.read();
        Ok(filter.apply(guard.confessions.values().cloned()))
    }

    async fn get_confession(
        &self,
        id: Uuid,
    ) -> crate::Result<Option<Confession>> {
        Ok(self.state.read().confessions.get(&id).cloned())
    }

    #[tracing::instrument(skip_all, fields(id = %confession.id))]
    async fn insert_confession(
        &self,
        confession: &Confession,
    ) -> crate::Result<()> {
        let mut guard = self.state.write();
        if guard.confessions.contains_key(&confession.id) {
            return Err(Error::Generic("confession already exists"));
        }
        guard.confessions.insert(confession.id, confession.clone());
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn set_hidden(
        &self,
        id: Uuid,
        hidden: bool,
    ) -> crate::Result<Option<Confession>> {
        let mut guard = self.state.write();
        Ok(guard.confessions.get_mut(&id).map(|c| {
            c.is_hidden = hidden;
            c.clone()
        }))
    }

    async fn get_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> crate::Result<Option<VoteType>> {
        let guard = self.state.read();
        Ok(guard
            .votes
            .get(&(confession_id, visitor_id.to_owned()))
            .map(|v| v.vote_type))
    }

    #[tracing::instrument(skip(self))]
    async fn cast_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        vote_type: VoteType,
    ) -> crate::Result<Option<Confession>> {
        Ok(self.change_vote(confession_id, visitor_id, Some(vote_type)))
    }

    #[tracing::instrument(skip(self))]
    async fn remove_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> crate::Result<Option<Confession>> {
        Ok(self.change_vote(confession_id, visitor_id, None))
    }

    async fn confession_stats(
        &self,
        top: usize,
    ) -> crate::Result<ConfessionStats> {
        let guard = self.state.read();
        Ok(ConfessionStats::collect(guard.confessions.values().cloned(), top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confession_relayer_types::Category;

    async fn seeded() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::default();
        let c = Confession::anchored("gm", Category::Wisdom, "0x01");
        store.insert_confession(&c).await.unwrap();
        (store, c.id)
    }

    #[tokio::test]
    async fn switching_votes_never_double_counts() {
        let (store, id) = seeded().await;
        let c = store.cast_vote(id, "v1", VoteType::Like).await.unwrap().unwrap();
        assert_eq!((c.likes, c.dislikes), (1, 0));
        // repeating the same vote is a no-op.
        let c = store.cast_vote(id, "v1", VoteType::Like).await.unwrap().unwrap();
        assert_eq!((c.likes, c.dislikes), (1, 0));
        let c = store
            .cast_vote(id, "v1", VoteType::Dislike)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((c.likes, c.dislikes), (0, 1));
        let c = store.cast_vote(id, "v2", VoteType::Dislike).await.unwrap().unwrap();
        assert_eq!((c.likes, c.dislikes), (0, 2));
        assert_eq!(
            store.get_vote(id, "v1").await.unwrap(),
            Some(VoteType::Dislike)
        );

        let c = store.remove_vote(id, "v1").await.unwrap().unwrap();
        assert_eq!((c.likes, c.dislikes), (0, 1));
        assert_eq!(store.get_vote(id, "v1").await.unwrap(), None);
        // removing twice changes nothing.
        let c = store.remove_vote(id, "v1").await.unwrap().unwrap();
        assert_eq!((c.likes, c.dislikes), (0, 1));
    }

    #[tokio::test]
    async fn concurrent_votes_match_vote_rows() {
        let (store, id) = seeded().await;
        let tasks = (0..50).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let visitor = format!("v{}", i % 10);
                let vote = if i % 3 == 0 {
                    VoteType::Dislike
                } else {
                    VoteType::Like
                };
                store.cast_vote(id, &visitor, vote).await.unwrap();
            })
        });
        futures::future::join_all(tasks).await;
        let c = store.get_confession(id).await.unwrap().unwrap();
        let guard = store.state.read();
        let likes = guard
            .votes
            .values()
            .filter(|v| v.vote_type == VoteType::Like)
            .count() as u64;
        let dislikes = guard.votes.len() as u64 - likes;
        assert_eq!((c.likes, c.dislikes), (likes, dislikes));
        assert_eq!(guard.votes.len(), 10);
    }

    #[tokio::test]
    async fn unknown_confession_yields_none() {
        let store = InMemoryStore::default();
        let res = store
            .cast_vote(Uuid::new_v4(), "v", VoteType::Like)
            .await
            .unwrap();
        assert!(res.is_none());
        assert!(store.set_hidden(Uuid::new_v4(), true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let (store, id) = seeded().await;
        let mut c = store.get_confession(id).await.unwrap().unwrap();
        c.tx_hash = Some("0x02".into());
        assert!(store.insert_confession(&c).await.is_err());
        let stored = store.get_confession(id).await.unwrap().unwrap();
        assert_eq!(stored.tx_hash.as_deref(), Some("0x01"));
    }
}
