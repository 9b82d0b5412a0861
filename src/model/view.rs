use serde::{Deserialize, Serialize};

use crate::model::{
    ballot::Ballot,
    vote::{Vote, VoteAndBallots},
};

/// A vote as shown to a particular voter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    pub vote: Vote,
    /// Empty while the vote is active.
    pub ballots: Vec<Ballot>,
    /// The caller's own ballot, only set while the vote is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_ballot: Option<Ballot>,
}

impl VoteView {
    /// A view revealing no ballots other than the caller's.
    pub fn redacted(vote: Vote, own_ballot: Option<Ballot>) -> Self {
        Self {
            vote,
            ballots: Vec::new(),
            own_ballot,
        }
    }

    /// The unredacted aggregate, for votes that have closed.
    pub fn full(aggregate: VoteAndBallots) -> Self {
        Self {
            vote: aggregate.vote,
            ballots: aggregate.ballots,
            own_ballot: None,
        }
    }
}
