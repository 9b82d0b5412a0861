use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ballot::{Ballot, BallotId};

pub type VoteId = String;

/// Vote-defining data this crate never interprets: question, options, etc.
pub type VoteMetadata = Map<String, Value>;

/// Keys the vote's own fields are serialized under; metadata may not shadow them.
const RESERVED_FIELDS: [&str; 2] = ["id", "deadline"];

/// States in the Vote lifecycle. Derived from the deadline at read time, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VoteState {
    /// Before the deadline. Ballots are only visible to their own voters.
    Active,
    /// At or after the deadline. All ballots are public.
    Closed,
}

/// A vote definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub deadline: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: VoteMetadata,
}

impl Vote {
    /// Any `id` or `deadline` keys in `metadata` are discarded.
    pub fn new(id: impl Into<VoteId>, deadline: DateTime<Utc>, metadata: VoteMetadata) -> Self {
        Self {
            id: id.into(),
            deadline,
            metadata,
        }
        .without_reserved_metadata()
    }

    /// Drop metadata keys that would collide with the vote's own fields
    /// when serialized.
    pub fn without_reserved_metadata(mut self) -> Self {
        for field in RESERVED_FIELDS {
            self.metadata.remove(field);
        }
        self
    }

    /// The state of this vote as observed at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> VoteState {
        if now < self.deadline {
            VoteState::Active
        } else {
            VoteState::Closed
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == VoteState::Active
    }
}

/// A vote together with every ballot cast for it, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteAndBallots {
    pub vote: Vote,
    /// Unique by ballot ID.
    pub ballots: Vec<Ballot>,
}

impl VoteAndBallots {
    /// A freshly created vote has no ballots.
    pub fn new(vote: Vote) -> Self {
        Self {
            vote,
            ballots: Vec::new(),
        }
    }

    /// Find the ballot with the given ID, if one has been cast.
    pub fn ballot(&self, id: &BallotId) -> Option<&Ballot> {
        self.ballots.iter().find(|ballot| &ballot.id == id)
    }

    /// Insert a ballot, dropping any previous ballot with the same ID.
    pub fn replace_ballot(&mut self, ballot: Ballot) {
        self.ballots.retain(|existing| existing.id != ballot.id);
        self.ballots.push(ballot);
    }
}
