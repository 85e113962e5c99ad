use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::validate_batch;
use crate::{BackendError, BackendResult, BatchOp, Cursor, KeyValueBackend, ScanPage, StoredValue};

/// Set members keyed by their scan hash.
type Members = BTreeSet<(u64, String)>;

#[derive(Debug, Clone)]
enum Entry {
    Value(StoredValue),
    Set(Members),
}

/// Position of `member` in scan order. Fixed for the life of the process.
fn member_hash(member: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    member.hash(&mut hasher);
    hasher.finish()
}

/// In-memory key-value backend for tests and local runs.
///
/// Keys hold either a plain value or a set of members, and operations on the
/// wrong kind fail with `WrongType`, as they would against Redis. Sets are
/// ordered by a stable hash of each member and the scan cursor is the hash
/// to resume from, so members added or removed elsewhere in the set never
/// shift the position of the others. A scan therefore returns every member
/// present for its whole duration exactly once.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys stored, sets included.
    pub async fn key_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns every member of the set at `set`, sorted.
    pub async fn members(&self, set: &str) -> BackendResult<Vec<String>> {
        match self.entries.read().await.get(set) {
            Some(Entry::Set(members)) => {
                let mut names: Vec<String> =
                    members.iter().map(|(_, member)| member.clone()).collect();
                names.sort();
                Ok(names)
            }
            Some(Entry::Value(_)) => Err(BackendError::WrongType(set.to_string())),
            None => Ok(Vec::new()),
        }
    }

    /// Clears all keys.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn execute_one(&self, op: BatchOp) -> BackendResult<()> {
        self.execute_atomic(vec![op]).await
    }
}

fn check_guard(entries: &HashMap<String, Entry>, op: &BatchOp) -> BackendResult<()> {
    match op {
        BatchOp::SetIfAbsent { key, .. } if entries.contains_key(key) => {
            Err(BackendError::KeyExists(key.clone()))
        }
        BatchOp::SetIfPresent { key, .. } | BatchOp::Delete { key }
            if !entries.contains_key(key) =>
        {
            Err(BackendError::KeyMissing(key.clone()))
        }
        BatchOp::AddToSet { set, .. } | BatchOp::RemoveFromSet { set, .. }
            if matches!(entries.get(set), Some(Entry::Value(_))) =>
        {
            Err(BackendError::WrongType(set.clone()))
        }
        _ => Ok(()),
    }
}

// Only called once every guard of the batch has passed.
fn apply(entries: &mut HashMap<String, Entry>, op: BatchOp) {
    match op {
        BatchOp::SetIfAbsent { key, value } | BatchOp::SetIfPresent { key, value } => {
            entries.insert(key, Entry::Value(value));
        }
        BatchOp::Delete { key } => {
            entries.remove(&key);
        }
        BatchOp::AddToSet { set, member } => {
            if let Entry::Set(members) = entries
                .entry(set)
                .or_insert_with(|| Entry::Set(BTreeSet::new()))
            {
                members.insert((member_hash(&member), member));
            }
        }
        BatchOp::RemoveFromSet { set, member } => {
            let now_empty = match entries.get_mut(&set) {
                Some(Entry::Set(members)) => {
                    members.remove(&(member_hash(&member), member));
                    members.is_empty()
                }
                _ => false,
            };
            // Empty sets vanish, as in Redis.
            if now_empty {
                entries.remove(&set);
            }
        }
    }
}

/// Matches `text` against a glob supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let (p, t) = (pattern.as_bytes(), text.as_bytes());
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn set_if_absent(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        self.execute_one(BatchOp::SetIfAbsent {
            key: key.to_string(),
            value,
        })
        .await
    }

    async fn set_if_present(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        self.execute_one(BatchOp::SetIfPresent {
            key: key.to_string(),
            value,
        })
        .await
    }

    async fn get(&self, key: &str) -> BackendResult<Option<StoredValue>> {
        match self.entries.read().await.get(key) {
            Some(Entry::Value(value)) => Ok(Some(value.clone())),
            Some(Entry::Set(_)) => Err(BackendError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.execute_one(BatchOp::Delete {
            key: key.to_string(),
        })
        .await
    }

    async fn add_to_set(&self, set: &str, member: &str) -> BackendResult<()> {
        self.execute_one(BatchOp::AddToSet {
            set: set.to_string(),
            member: member.to_string(),
        })
        .await
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> BackendResult<()> {
        self.execute_one(BatchOp::RemoveFromSet {
            set: set.to_string(),
            member: member.to_string(),
        })
        .await
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage> {
        let entries = self.entries.read().await;
        let members = match entries.get(set) {
            Some(Entry::Set(members)) => members,
            Some(Entry::Value(_)) => return Err(BackendError::WrongType(set.to_string())),
            None => return Ok(ScanPage::default()),
        };

        let count = count.max(1);
        let mut page = Vec::new();
        let mut examined = 0;
        let mut last_hash = None;
        let mut next = Cursor::START;

        // Members sharing a hash always land on the same page, so the next
        // cursor is strictly above every hash returned and never zero.
        for (hash, member) in members.range((cursor.as_u64(), String::new())..) {
            if examined >= count && last_hash != Some(*hash) {
                next = Cursor::new(*hash);
                break;
            }
            examined += 1;
            last_hash = Some(*hash);
            if glob_match(pattern, member) {
                page.push(member.clone());
            }
        }

        Ok(ScanPage {
            members: page,
            next,
        })
    }

    async fn multi_get(&self, keys: &[String]) -> BackendResult<Vec<Option<StoredValue>>> {
        let entries = self.entries.read().await;
        // Non-value keys read as absent, like MGET.
        Ok(keys
            .iter()
            .map(|key| match entries.get(key) {
                Some(Entry::Value(value)) => Some(value.clone()),
                _ => None,
            })
            .collect())
    }

    async fn execute_atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()> {
        validate_batch(&ops)?;

        let mut entries = self.entries.write().await;
        for op in &ops {
            check_guard(&entries, op)?;
        }
        for op in ops {
            apply(&mut entries, op);
        }

        Ok(())
    }
}
