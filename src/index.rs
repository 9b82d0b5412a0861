//! The vote index: every vote, its ballots, and the secrets used to derive
//! pseudonymous ballot IDs.
//!
//! The index file at `index_path` maps vote IDs to secrets and is
//! authoritative for which votes exist. Each vote and its ballots live in
//! `<dir of index_path>/votes/<vote_id>`.
//!
//! Locking: the tables sit behind one `RwLock`, held only long enough to
//! clone out handles. Each vote keeps its aggregate as an immutable `Arc`
//! snapshot; writers build the next snapshot, persist it, and only then swap
//! it in, so readers see either the old or the new state and are never
//! blocked by disk I/O. Writers to the same vote are serialised by a
//! per-vote mutex; vote creation and flushes by an index-wide one.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        ballot::{Ballot, BallotContent, BallotId},
        device::RegisteredDevice,
        secret::VoteSecret,
        view::VoteView,
        vote::{Vote, VoteAndBallots, VoteId},
    },
    persistence::{load_json, malformed, save_json, FileStore, Store},
    pseudonym::derive_ballot_id,
};

/// Directory, next to the index file, holding one file per vote.
const VOTES_DIR: &str = "votes";

/// The on-disk shape of the index file.
type Secrets = HashMap<VoteId, VoteSecret>;

/// One vote's current state.
struct VoteSlot {
    /// Serialises writers; never held by readers.
    writer: Mutex<()>,
    current: RwLock<Arc<VoteAndBallots>>,
}

impl VoteSlot {
    fn new(aggregate: VoteAndBallots) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(aggregate)),
        }
    }

    fn snapshot(&self) -> Arc<VoteAndBallots> {
        read(&self.current).clone()
    }

    fn commit(&self, next: VoteAndBallots) {
        *write(&self.current) = Arc::new(next);
    }
}

#[derive(Default)]
struct Tables {
    votes: HashMap<VoteId, Arc<VoteSlot>>,
    secrets: Secrets,
}

/// Keeps track of votes.
pub struct VoteIndex<S: Store = FileStore> {
    index_path: PathBuf,
    store: S,
    tables: RwLock<Tables>,
    /// Serialises writes to the index file.
    index_writer: Mutex<()>,
}

impl VoteIndex<FileStore> {
    /// Open the file-backed index named by the config.
    pub fn open(config: &Config) -> Result<Self> {
        Self::read_or_create(config.index_path(), FileStore)
    }
}

impl<S: Store> VoteIndex<S> {
    /// An empty index. Nothing is written until the first vote is created.
    pub fn new(index_path: impl Into<PathBuf>, store: S) -> Self {
        Self {
            index_path: index_path.into(),
            store,
            tables: RwLock::default(),
            index_writer: Mutex::new(()),
        }
    }

    /// Load the index at `index_path`, or start empty if there is none yet.
    ///
    /// Every vote listed in the index must have a readable vote file whose
    /// vote ID matches; otherwise loading fails rather than dropping the vote.
    pub fn read_or_create(index_path: impl Into<PathBuf>, store: S) -> Result<Self> {
        let index_path = index_path.into();
        let secrets: Secrets = match load_json(&store, &index_path)? {
            Some(secrets) => secrets,
            None => {
                info!(
                    "No vote index at {}, starting with an empty index",
                    index_path.display()
                );
                return Ok(Self::new(index_path, store));
            }
        };

        let mut votes = HashMap::with_capacity(secrets.len());
        for (vote_id, secret) in &secrets {
            check_vote_id(vote_id).map_err(|err| malformed(&index_path, err))?;
            if secret.is_empty() {
                return Err(malformed(&index_path, Error::EmptySecret(vote_id.clone())));
            }
            let path = vote_id_to_path(&index_path, vote_id);
            let aggregate: VoteAndBallots = load_json(&store, &path)?
                .ok_or_else(|| malformed(&path, "listed in the vote index but missing"))?;
            if &aggregate.vote.id != vote_id {
                return Err(malformed(
                    &path,
                    format!("contains vote {} instead", aggregate.vote.id),
                ));
            }
            debug!("Loaded vote {vote_id} with {} ballots", aggregate.ballots.len());
            votes.insert(vote_id.clone(), Arc::new(VoteSlot::new(aggregate)));
        }
        info!("Loaded {} votes from {}", votes.len(), index_path.display());

        Ok(Self {
            index_path,
            store,
            tables: RwLock::new(Tables { votes, secrets }),
            index_writer: Mutex::new(()),
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets a user's ballot ID for a particular vote.
    pub fn ballot_id(&self, vote_id: &str, device: &RegisteredDevice) -> Result<BallotId> {
        let secret = self.secret(vote_id)?;
        Ok(derive_ballot_id(&secret, device.user_id()))
    }

    /// Gets all currently active votes, as seen by `device`.
    pub fn get_active_votes(&self, device: &RegisteredDevice) -> Result<Vec<VoteView>> {
        self.get_active_votes_at(device, Utc::now())
    }

    /// Gets all votes active at `now`, as seen by `device`. The order is unspecified.
    pub fn get_active_votes_at(
        &self,
        device: &RegisteredDevice,
        now: DateTime<Utc>,
    ) -> Result<Vec<VoteView>> {
        let entries = {
            let tables = read(&self.tables);
            tables
                .votes
                .iter()
                .map(|(id, slot)| (slot.clone(), tables.secrets.get(id).cloned()))
                .collect::<Vec<_>>()
        };

        entries
            .into_iter()
            .map(|(slot, secret)| (slot.snapshot(), secret))
            .filter(|(aggregate, _)| aggregate.vote.is_active_at(now))
            .map(|(aggregate, secret)| {
                prepare_for_transmission(&aggregate, secret.as_ref(), device, now)
            })
            .collect()
    }

    /// Gets a vote, as seen by `device`.
    pub fn get_vote(&self, vote_id: &str, device: &RegisteredDevice) -> Result<VoteView> {
        self.get_vote_at(vote_id, device, Utc::now())
    }

    /// Gets a vote, as seen by `device` at `now`.
    pub fn get_vote_at(
        &self,
        vote_id: &str,
        device: &RegisteredDevice,
        now: DateTime<Utc>,
    ) -> Result<VoteView> {
        let (slot, secret) = {
            let tables = read(&self.tables);
            let slot = tables
                .votes
                .get(vote_id)
                .cloned()
                .ok_or_else(|| Error::VoteNotFound(vote_id.to_string()))?;
            (slot, tables.secrets.get(vote_id).cloned())
        };
        prepare_for_transmission(&slot.snapshot(), secret.as_ref(), device, now)
    }

    /// Gets every vote definition, active or closed, without ballots.
    pub fn get_all_votes(&self) -> Vec<Vote> {
        let slots = read(&self.tables).votes.values().cloned().collect::<Vec<_>>();
        slots
            .into_iter()
            .map(|slot| slot.snapshot().vote.clone())
            .collect()
    }

    /// Casts a ballot, replacing any earlier ballot by the same voter.
    /// Returns the ballot ID as a receipt.
    ///
    /// The vote file is written before the new ballot becomes visible; if
    /// the write fails, nothing changes.
    pub fn cast_ballot(
        &self,
        vote_id: &str,
        content: BallotContent,
        device: &RegisteredDevice,
    ) -> Result<BallotId> {
        let (slot, secret) = {
            let tables = read(&self.tables);
            let not_found = || Error::VoteNotFoundOrExpired(vote_id.to_string());
            let secret = tables
                .secrets
                .get(vote_id)
                .filter(|secret| !secret.is_empty())
                .cloned()
                .ok_or_else(not_found)?;
            let slot = tables.votes.get(vote_id).cloned().ok_or_else(not_found)?;
            (slot, secret)
        };
        let ballot_id = derive_ballot_id(&secret, device.user_id());

        let _writer = lock(&slot.writer);
        let mut next = VoteAndBallots::clone(&slot.snapshot());
        next.replace_ballot(Ballot::new(ballot_id.clone(), content));
        save_json(&self.store, &self.vote_path(vote_id), &next)?;
        slot.commit(next);

        info!("Ballot cast for vote {vote_id}");
        Ok(ballot_id)
    }

    /// Registers a new vote under a freshly generated secret.
    pub fn create_vote(&self, vote: Vote) -> Result<()> {
        self.create_vote_with_secret(vote, VoteSecret::generate(rand::thread_rng()))
    }

    /// Registers a new vote under the given secret.
    ///
    /// The vote file is written first and the index file second, so a vote
    /// is never listed in the index without its file.
    pub fn create_vote_with_secret(&self, vote: Vote, secret: VoteSecret) -> Result<()> {
        check_vote_id(&vote.id)?;
        if secret.is_empty() {
            return Err(Error::EmptySecret(vote.id));
        }
        // Fields are public, so `Vote::new` may have been bypassed.
        let vote = vote.without_reserved_metadata();

        let _writer = lock(&self.index_writer);
        let mut secrets = {
            let tables = read(&self.tables);
            if tables.votes.contains_key(&vote.id) || tables.secrets.contains_key(&vote.id) {
                return Err(Error::VoteAlreadyExists(vote.id));
            }
            tables.secrets.clone()
        };
        let vote_id = vote.id.clone();
        secrets.insert(vote_id.clone(), secret.clone());

        let aggregate = VoteAndBallots::new(vote);
        save_json(&self.store, &self.vote_path(&vote_id), &aggregate)?;
        save_json(&self.store, &self.index_path, &secrets)?;

        let mut tables = write(&self.tables);
        tables
            .votes
            .insert(vote_id.clone(), Arc::new(VoteSlot::new(aggregate)));
        tables.secrets.insert(vote_id.clone(), secret);
        info!("Created vote {vote_id}");
        Ok(())
    }

    /// Rewrite the index file and every vote file from memory.
    pub fn flush(&self) -> Result<()> {
        let _writer = lock(&self.index_writer);
        let (secrets, slots) = {
            let tables = read(&self.tables);
            let slots = tables
                .votes
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect::<Vec<_>>();
            (tables.secrets.clone(), slots)
        };

        for (vote_id, slot) in &slots {
            let _vote_writer = lock(&slot.writer);
            save_json(&self.store, &self.vote_path(vote_id), &*slot.snapshot())?;
        }
        save_json(&self.store, &self.index_path, &secrets)?;
        info!("Flushed {} votes to {}", slots.len(), self.index_path.display());
        Ok(())
    }

    fn vote_path(&self, vote_id: &str) -> PathBuf {
        vote_id_to_path(&self.index_path, vote_id)
    }

    fn secret(&self, vote_id: &str) -> Result<VoteSecret> {
        read(&self.tables)
            .secrets
            .get(vote_id)
            .filter(|secret| !secret.is_empty())
            .cloned()
            .ok_or_else(|| Error::VoteNotFoundOrExpired(vote_id.to_string()))
    }
}

/// Build the view of `aggregate` that `device` is allowed to see at `now`.
///
/// While the vote is active only the caller's own ballot is included, looked
/// up by the same derivation `cast_ballot` uses. Once closed, everything is.
fn prepare_for_transmission(
    aggregate: &VoteAndBallots,
    secret: Option<&VoteSecret>,
    device: &RegisteredDevice,
    now: DateTime<Utc>,
) -> Result<VoteView> {
    if !aggregate.vote.is_active_at(now) {
        return Ok(VoteView::full(aggregate.clone()));
    }

    let secret = secret
        .filter(|secret| !secret.is_empty())
        .ok_or_else(|| {
            warn!("Active vote {} has no secret", aggregate.vote.id);
            Error::VoteNotFoundOrExpired(aggregate.vote.id.clone())
        })?;
    let ballot_id = derive_ballot_id(secret, device.user_id());
    let own_ballot = aggregate.ballot(&ballot_id).cloned();
    Ok(VoteView::redacted(aggregate.vote.clone(), own_ballot))
}

/// Takes a vote ID and an index path and turns it into the path where the
/// vote's data is stored.
pub fn vote_id_to_path(index_path: &Path, vote_id: &str) -> PathBuf {
    index_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(VOTES_DIR)
        .join(vote_id)
}

/// Vote IDs name files, so they must be a single plain path component.
pub fn check_vote_id(vote_id: &str) -> Result<()> {
    let mut components = Path::new(vote_id).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == vote_id
    );
    if plain && !vote_id.starts_with('.') && !vote_id.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(Error::InvalidVoteId(vote_id.to_string()))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::*;
    use crate::persistence::{MemoryStore, StoreError};

    fn content(value: Value) -> BallotContent {
        value.as_object().cloned().unwrap()
    }

    fn memory_index() -> VoteIndex<MemoryStore> {
        VoteIndex::new("data/index.json", MemoryStore::default())
    }

    /// Vote `v1` with secret `s1`, open for another ten seconds.
    fn index_with_v1() -> (VoteIndex<MemoryStore>, Vote) {
        let index = memory_index();
        let vote = Vote::new(
            "v1",
            Utc::now() + Duration::seconds(10),
            content(json!({ "name": "Picnic?" })),
        );
        index
            .create_vote_with_secret(vote.clone(), VoteSecret::from("s1"))
            .unwrap();
        (index, vote)
    }

    #[test]
    fn cast_and_view_own_ballot() {
        let (index, vote) = index_with_v1();
        let alice = RegisteredDevice::alice();
        let bob = RegisteredDevice::bob();

        let ballot_id = index
            .cast_ballot("v1", content(json!({ "choice": "yes" })), &alice)
            .unwrap();
        assert_eq!(
            ballot_id.as_str(),
            "9a681839b1e452811b548907b3bcda77a6ddde73046bec885224826fa6f98802"
        );
        assert_eq!(index.ballot_id("v1", &alice).unwrap(), ballot_id);

        let alice_view = index.get_vote("v1", &alice).unwrap();
        assert_eq!(alice_view.vote, vote);
        assert!(alice_view.ballots.is_empty());
        let own = alice_view.own_ballot.unwrap();
        assert_eq!(own.id, ballot_id);
        assert_eq!(own.content, content(json!({ "choice": "yes" })));

        let bob_view = index.get_vote("v1", &bob).unwrap();
        assert!(bob_view.ballots.is_empty());
        assert!(bob_view.own_ballot.is_none());
    }

    #[test]
    fn recasting_replaces() {
        let (index, _) = index_with_v1();
        let alice = RegisteredDevice::alice();

        let first = index
            .cast_ballot("v1", content(json!({ "choice": "yes" })), &alice)
            .unwrap();
        let second = index
            .cast_ballot("v1", content(json!({ "choice": "no" })), &alice)
            .unwrap();
        assert_eq!(first, second);

        let after = index.get_vote("v1", &alice).unwrap().vote.deadline + Duration::seconds(1);
        let closed = index.get_vote_at("v1", &alice, after).unwrap();
        assert_eq!(closed.ballots.len(), 1);
        assert_eq!(closed.ballots[0].content, content(json!({ "choice": "no" })));
    }

    #[test]
    fn closure_reveals_all_ballots() {
        let (index, vote) = index_with_v1();
        let alice = RegisteredDevice::alice();
        let bob = RegisteredDevice::bob();
        index
            .cast_ballot("v1", content(json!({ "choice": "yes" })), &alice)
            .unwrap();
        index
            .cast_ballot("v1", content(json!({ "choice": "no" })), &bob)
            .unwrap();

        let before = index
            .get_vote_at("v1", &bob, vote.deadline - Duration::nanoseconds(1))
            .unwrap();
        assert!(before.ballots.is_empty());
        assert_eq!(
            before.own_ballot.unwrap().id,
            index.ballot_id("v1", &bob).unwrap()
        );

        let at = index.get_vote_at("v1", &bob, vote.deadline).unwrap();
        assert_eq!(at.ballots.len(), 2);
        assert!(at.own_ballot.is_none());

        assert!(index
            .get_active_votes_at(&bob, vote.deadline)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unknown_vote() {
        let (index, _) = index_with_v1();
        let alice = RegisteredDevice::alice();

        let err = index
            .cast_ballot("nope", content(json!({ "choice": "yes" })), &alice)
            .unwrap_err();
        assert!(matches!(err, Error::VoteNotFoundOrExpired(id) if id == "nope"));

        let err = index.get_vote("nope", &alice).unwrap_err();
        assert!(matches!(err, Error::VoteNotFound(id) if id == "nope"));

        let err = index.ballot_id("nope", &alice).unwrap_err();
        assert!(matches!(err, Error::VoteNotFoundOrExpired(_)));

        // The failed cast left nothing behind.
        let votes = index.get_all_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].id, "v1");
        assert!(matches!(
            index.store().load(Path::new("data/votes/nope")),
            Err(StoreError::NotFound)
        ));
        let stored: VoteAndBallots = load_json(index.store(), Path::new("data/votes/v1"))
            .unwrap()
            .unwrap();
        assert!(stored.ballots.is_empty());
        let secrets: Secrets = load_json(index.store(), Path::new("data/index.json"))
            .unwrap()
            .unwrap();
        assert_eq!(secrets.len(), 1);
    }

    #[test]
    fn reserved_metadata_keys_survive_reload() {
        let index = memory_index();
        let mut vote = Vote::new(
            "v1",
            Utc::now() + Duration::seconds(10),
            content(json!({ "name": "q" })),
        );
        // Bypass `Vote::new` through the public field.
        vote.metadata.insert("deadline".to_string(), json!("whenever"));
        vote.metadata.insert("id".to_string(), json!("v9"));
        index.create_vote(vote.clone()).unwrap();

        let VoteIndex { store, .. } = index;
        let reloaded = VoteIndex::read_or_create("data/index.json", store).unwrap();
        let view = reloaded
            .get_vote("v1", &RegisteredDevice::alice())
            .unwrap();
        assert_eq!(view.vote.id, "v1");
        assert_eq!(view.vote.deadline, vote.deadline);
        assert_eq!(view.vote.metadata, content(json!({ "name": "q" })));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let index = memory_index();
        let deadline = Utc::now() + Duration::seconds(10);
        index
            .create_vote(Vote::new("good", deadline, Default::default()))
            .unwrap();

        let err = index
            .create_vote_with_secret(
                Vote::new("bad", deadline, Default::default()),
                VoteSecret::from(""),
            )
            .unwrap_err();
        assert!(matches!(err, Error::EmptySecret(id) if id == "bad"));

        let active = index
            .get_active_votes(&RegisteredDevice::alice())
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].vote.id, "good");
    }

    #[test]
    fn empty_persisted_secret_fails_startup() {
        let store = MemoryStore::default();
        save_json(
            &store,
            Path::new("data/index.json"),
            &HashMap::from([("v1".to_string(), VoteSecret::from(""))]),
        )
        .unwrap();
        save_json(
            &store,
            Path::new("data/votes/v1"),
            &VoteAndBallots::new(Vote::active_example()),
        )
        .unwrap();

        let err = VoteIndex::read_or_create("data/index.json", store).err().unwrap();
        assert!(matches!(err, Error::MalformedPersistedState { path, .. }
            if path == Path::new("data/index.json")));
    }

    #[test]
    fn failed_save_changes_nothing() {
        let (index, vote) = index_with_v1();
        let alice = RegisteredDevice::alice();
        index
            .cast_ballot("v1", content(json!({ "choice": "yes" })), &alice)
            .unwrap();

        index.store().set_available(false);
        let err = index
            .cast_ballot("v1", content(json!({ "choice": "no" })), &alice)
            .unwrap_err();
        assert!(matches!(err, Error::PersistenceUnavailable { .. }));

        let view = index.get_vote("v1", &alice).unwrap();
        assert_eq!(
            view.own_ballot.unwrap().content,
            content(json!({ "choice": "yes" }))
        );

        let err = index
            .create_vote(Vote::new("v2", vote.deadline, Default::default()))
            .unwrap_err();
        assert!(matches!(err, Error::PersistenceUnavailable { .. }));
        assert_eq!(index.get_all_votes().len(), 1);
    }

    #[test]
    fn duplicate_and_invalid_votes_are_rejected() {
        let (index, vote) = index_with_v1();

        let err = index.create_vote(vote.clone()).unwrap_err();
        assert!(matches!(err, Error::VoteAlreadyExists(id) if id == "v1"));

        for bad in ["", ".", "..", ".hidden", "a/b", "../v1", "a\\b"] {
            let err = index
                .create_vote(Vote::new(bad, vote.deadline, Default::default()))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidVoteId(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn save_then_load_is_equivalent() {
        let (index, vote) = index_with_v1();
        let alice = RegisteredDevice::alice();
        let bob = RegisteredDevice::bob();
        index
            .create_vote(Vote::new(
                "v2",
                Utc::now() - Duration::seconds(10),
                Default::default(),
            ))
            .unwrap();
        index
            .cast_ballot("v1", content(json!({ "choice": "yes" })), &alice)
            .unwrap();
        index
            .cast_ballot("v2", content(json!({ "choice": "no" })), &bob)
            .unwrap();
        index.flush().unwrap();

        let VoteIndex { store, .. } = index;
        let reloaded = VoteIndex::read_or_create("data/index.json", store).unwrap();

        let active = reloaded.get_active_votes(&alice).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].vote, vote);
        assert_eq!(
            active[0].own_ballot.as_ref().unwrap().content,
            content(json!({ "choice": "yes" }))
        );

        let closed = reloaded.get_vote("v2", &alice).unwrap();
        assert_eq!(closed.ballots.len(), 1);
        assert_eq!(
            closed.ballots[0].id,
            reloaded.ballot_id("v2", &bob).unwrap()
        );

        // The secret survived, so re-casting still replaces.
        reloaded
            .cast_ballot("v1", content(json!({ "choice": "no" })), &alice)
            .unwrap();
        let after = vote.deadline + Duration::seconds(1);
        assert_eq!(
            reloaded.get_vote_at("v1", &alice, after).unwrap().ballots.len(),
            1
        );
    }

    #[test]
    fn missing_index_starts_empty() {
        let index =
            VoteIndex::read_or_create("data/index.json", MemoryStore::default()).unwrap();
        assert!(index.get_all_votes().is_empty());
    }

    #[test]
    fn missing_vote_file_fails_startup() {
        let store = MemoryStore::default();
        save_json(
            &store,
            Path::new("data/index.json"),
            &HashMap::from([("v1".to_string(), VoteSecret::from("s1"))]),
        )
        .unwrap();

        let err = VoteIndex::read_or_create("data/index.json", store).err().unwrap();
        assert!(matches!(err, Error::MalformedPersistedState { path, .. }
            if path == Path::new("data/votes/v1")));
    }

    #[test]
    fn mismatched_vote_file_fails_startup() {
        let store = MemoryStore::default();
        save_json(
            &store,
            Path::new("data/index.json"),
            &HashMap::from([("v1".to_string(), VoteSecret::from("s1"))]),
        )
        .unwrap();
        save_json(
            &store,
            Path::new("data/votes/v1"),
            &VoteAndBallots::new(Vote::closed_example()),
        )
        .unwrap();

        let err = VoteIndex::read_or_create("data/index.json", store).err().unwrap();
        assert!(matches!(err, Error::MalformedPersistedState { .. }));
    }

    #[test]
    fn malformed_index_fails_startup() {
        let store = MemoryStore::default();
        store
            .save(Path::new("data/index.json"), br#"{"v1": 42}"#)
            .unwrap();

        let err = VoteIndex::read_or_create("data/index.json", store).err().unwrap();
        assert!(matches!(err, Error::MalformedPersistedState { .. }));
    }

    #[test]
    fn vote_paths() {
        assert_eq!(
            vote_id_to_path(Path::new("/srv/ballots/index.json"), "v1"),
            Path::new("/srv/ballots/votes/v1")
        );
        assert_eq!(
            vote_id_to_path(Path::new("index.json"), "v1"),
            Path::new("votes/v1")
        );
    }

    #[test]
    fn concurrent_casts_keep_one_ballot_per_voter() {
        let (index, vote) = index_with_v1();
        let voters = ["alice", "bob", "carol", "dave"];

        thread::scope(|scope| {
            for voter in voters {
                let index = &index;
                scope.spawn(move || {
                    let device = RegisteredDevice::new(voter);
                    for round in 0..25 {
                        index
                            .cast_ballot("v1", content(json!({ "round": round })), &device)
                            .unwrap();
                        // Readers always see this voter's ballot once cast.
                        assert!(index.get_vote("v1", &device).unwrap().own_ballot.is_some());
                    }
                });
            }
        });

        let after = vote.deadline + Duration::seconds(1);
        let ballots = index
            .get_vote_at("v1", &RegisteredDevice::alice(), after)
            .unwrap()
            .ballots;
        assert_eq!(ballots.len(), voters.len());
        for ballot in ballots {
            assert_eq!(ballot.content, content(json!({ "round": 24 })));
        }
    }

    #[index_test(seeded)]
    fn file_backed_index_reloads(index: VoteIndex, dir: PathBuf) {
        let alice = RegisteredDevice::alice();
        let ballot_id = index
            .cast_ballot("v1", content(json!({ "optionRanking": ["yes"] })), &alice)
            .unwrap();

        let reloaded = VoteIndex::read_or_create(dir.join("index.json"), FileStore).unwrap();
        let view = reloaded.get_vote("v1", &alice).unwrap();
        assert_eq!(view.own_ballot.unwrap().id, ballot_id);
        assert_eq!(reloaded.get_all_votes().len(), 2);
        assert!(dir.join("votes").join("v0").is_file());
    }

    #[index_test]
    fn empty_directory_opens_empty(index: VoteIndex) {
        assert!(index.get_all_votes().is_empty());
        assert!(index
            .get_active_votes(&RegisteredDevice::alice())
            .unwrap()
            .is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn active_votes_as_a_set(offsets in prop::collection::vec(-100i64..100, 0..12)) {
            let index = memory_index();
            let now = Utc::now();
            let mut expected = HashSet::new();
            for (i, offset) in offsets.iter().enumerate() {
                let id = format!("v{i}");
                let deadline = now + Duration::seconds(*offset);
                index
                    .create_vote(Vote::new(id.clone(), deadline, Default::default()))
                    .unwrap();
                if now < deadline {
                    expected.insert(id);
                }
            }

            let active = index
                .get_active_votes_at(&RegisteredDevice::alice(), now)
                .unwrap()
                .into_iter()
                .map(|view| view.vote.id)
                .collect::<HashSet<_>>();
            prop_assert_eq!(active, expected);
        }

        #[test]
        fn active_view_never_leaks(casts in prop::collection::vec((0usize..5, 0u32..100), 1..30)) {
            let (index, _) = index_with_v1();
            let voters = (0..5)
                .map(|i| RegisteredDevice::new(format!("voter{i}")))
                .collect::<Vec<_>>();
            for (voter, choice) in &casts {
                index
                    .cast_ballot("v1", content(json!({ "choice": choice })), &voters[*voter])
                    .unwrap();
            }

            for voter in &voters {
                let view = index.get_vote("v1", voter).unwrap();
                prop_assert!(view.ballots.is_empty());
                if let Some(own) = view.own_ballot {
                    prop_assert_eq!(own.id, index.ballot_id("v1", voter).unwrap());
                }
            }

            let cast_by = casts.iter().map(|(voter, _)| *voter).collect::<HashSet<_>>();
            let after = Utc::now() + Duration::days(1);
            let closed = index.get_vote_at("v1", &voters[0], after).unwrap();
            prop_assert_eq!(closed.ballots.len(), cast_by.len());
        }
    }
}
