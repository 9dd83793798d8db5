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

use std::path::Path;

use confession_relayer_types::{Confession, Vote, VoteType};
use confession_relayer_utils::Error;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Transactional;
use uuid::Uuid;

use super::{ConfessionFilter, ConfessionStats, ConfessionStore};

const CONFESSIONS_TREE: &str = "confessions";
const VOTES_TREE: &str = "votes";

/// SledStore is a store that keeps confessions and votes in a [Sled](https://sled.rs)-based database.
///
/// Values are JSON encoded. Votes are keyed by `confession id ++ visitor id`.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .temporary(cfg!(test))
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Creates a temporary SledStore, removed when dropped.
    pub fn temporary() -> crate::Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Gets the total amount of data stored on disk
    pub fn get_data_stored_size(&self) -> u64 {
        self.db.size_on_disk().unwrap_or_default()
    }

    fn confessions(&self) -> crate::Result<sled::Tree> {
        Ok(self.db.open_tree(CONFESSIONS_TREE)?)
    }

    fn votes(&self) -> crate::Result<sled::Tree> {
        Ok(self.db.open_tree(VOTES_TREE)?)
    }

    fn all_confessions(&self) -> crate::Result<Vec<Confession>> {
        self.confessions()?
            .iter()
            .values()
            .map(|v| -> crate::Result<Confession> {
                Ok(serde_json::from_slice(&v?)?)
            })
            .collect()
    }

    fn change_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        to: Option<VoteType>,
    ) -> crate::Result<Option<Confession>> {
        let confessions = self.confessions()?;
        let votes = self.votes()?;
        let vote_key = vote_key(confession_id, visitor_id);
        let updated = (&confessions, &votes).transaction(|(c_tree, v_tree)| {
            let Some(raw) = c_tree.get(confession_id.as_bytes())? else {
                return Ok(None);
            };
            let mut confession: Confession = decode(&raw)?;
            let existing: Option<Vote> = match v_tree.get(&vote_key)? {
                Some(raw) => Some(decode(&raw)?),
                None => None,
            };
            let from = existing.as_ref().map(|v| v.vote_type);
            if from == to {
                return Ok(Some(confession));
            }
            match to {
                Some(vote_type) => {
                    let vote = match existing {
                        Some(mut v) => {
                            v.vote_type = vote_type;
                            v
                        }
                        None => Vote::new(confession_id, visitor_id, vote_type),
                    };
                    v_tree.insert(vote_key.as_slice(), encode(&vote)?)?;
                }
                None => {
                    v_tree.remove(vote_key.as_slice())?;
                }
            }
            confession.apply_vote_change(from, to);
            put_confession(c_tree, &confession)?;
            Ok(Some(confession))
        })?;
        Ok(updated)
    }
}

fn vote_key(confession_id: Uuid, visitor_id: &str) -> Vec<u8> {
    let mut key = confession_id.as_bytes().to_vec();
    key.extend_from_slice(visitor_id.as_bytes());
    key
}

type TxError = ConflictableTransactionError<std::io::Error>;

fn decode<T: serde::de::DeserializeOwned>(raw: &[u8]) -> Result<T, TxError> {
    serde_json::from_slice(raw).map_err(|e| {
        ConflictableTransactionError::Abort(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        ))
    })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TxError> {
    serde_json::to_vec(value).map_err(|e| {
        ConflictableTransactionError::Abort(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        ))
    })
}

fn put_confession(
    tree: &TransactionalTree,
    confession: &Confession,
) -> Result<(), TxError> {
    tree.insert(&confession.id.as_bytes()[..], encode(confession)?)?;
    Ok(())
}

#[async_trait::async_trait]
impl ConfessionStore for SledStore {
    #[tracing::instrument(skip(self))]
    async fn list_confessions(
        &self,
        filter: &ConfessionFilter,
    ) -> crate::Result<Vec<Confession>> {
        Ok(filter.apply(self.all_confessions()?))
    }

    async fn get_confession(
        &self,
        id: Uuid,
    ) -> crate::Result<Option<Confession>> {
        match self.confessions()?.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip_all, fields(id = %confession.id))]
    async fn insert_confession(
        &self,
        confession: &Confession,
    ) -> crate::Result<()> {
        let value = serde_json::to_vec(confession)?;
        let swapped = self.confessions()?.compare_and_swap(
            confession.id.as_bytes(),
            None::<&[u8]>,
            Some(value),
        )?;
        if swapped.is_err() {
            return Err(Error::Generic("confession already exists"));
        }
        self.db.flush_async().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn set_hidden(
        &self,
        id: Uuid,
        hidden: bool,
    ) -> crate::Result<Option<Confession>> {
        let confessions = self.confessions()?;
        let updated = confessions.transaction(|tree| {
            let Some(raw) = tree.get(id.as_bytes())? else {
                return Ok(None);
            };
            let mut confession: Confession = decode(&raw)?;
            confession.is_hidden = hidden;
            put_confession(tree, &confession)?;
            Ok(Some(confession))
        })?;
        Ok(updated)
    }

    async fn get_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> crate::Result<Option<VoteType>> {
        match self.votes()?.get(vote_key(confession_id, visitor_id))? {
            Some(raw) => {
                let vote: Vote = serde_json::from_slice(&raw)?;
                Ok(Some(vote.vote_type))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn cast_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
        vote_type: VoteType,
    ) -> crate::Result<Option<Confession>> {
        self.change_vote(confession_id, visitor_id, Some(vote_type))
    }

    #[tracing::instrument(skip(self))]
    async fn remove_vote(
        &self,
        confession_id: Uuid,
        visitor_id: &str,
    ) -> crate::Result<Option<Confession>> {
        self.change_vote(confession_id, visitor_id, None)
    }

    async fn confession_stats(
        &self,
        top: usize,
    ) -> crate::Result<ConfessionStats> {
        Ok(ConfessionStats::collect(self.all_confessions()?, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confession_relayer_types::Category;

    #[tokio::test]
    async fn votes_reconcile_counters() {
        let store = SledStore::temporary().unwrap();
        let c = Confession::anchored("gm", Category::Crypto, "0x01");
        store.insert_confession(&c).await.unwrap();

        store.cast_vote(c.id, "alice", VoteType::Like).await.unwrap();
        store.cast_vote(c.id, "bob", VoteType::Like).await.unwrap();
        let updated = store
            .cast_vote(c.id, "alice", VoteType::Dislike)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((updated.likes, updated.dislikes), (1, 1));

        let updated = store.remove_vote(c.id, "bob").await.unwrap().unwrap();
        assert_eq!((updated.likes, updated.dislikes), (0, 1));
        assert_eq!(store.get_vote(c.id, "bob").await.unwrap(), None);
        assert_eq!(
            store.get_vote(c.id, "alice").await.unwrap(),
            Some(VoteType::Dislike)
        );

        let stored = store.get_confession(c.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn hidden_flag_persists_and_filters() {
        let store = SledStore::temporary().unwrap();
        let c = Confession::anchored("secret", Category::Secret, "0x01");
        store.insert_confession(&c).await.unwrap();
        store.set_hidden(c.id, true).await.unwrap();

        let visible = store
            .list_confessions(&ConfessionFilter::default())
            .await
            .unwrap();
        assert!(visible.is_empty());
        let all = store
            .list_confessions(&ConfessionFilter {
                include_hidden: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_hidden);
    }

    #[tokio::test]
    async fn insert_never_overwrites() {
        let store = SledStore::temporary().unwrap();
        let c = Confession::anchored("gm", Category::Other, "0x01");
        store.insert_confession(&c).await.unwrap();
        assert!(store.insert_confession(&c).await.is_err());
    }

    #[tokio::test]
    async fn missing_confession_vote_is_none() {
        let store = SledStore::temporary().unwrap();
        let res = store
            .cast_vote(Uuid::new_v4(), "alice", VoteType::Like)
            .await
            .unwrap();
        assert!(res.is_none());
    }
}
