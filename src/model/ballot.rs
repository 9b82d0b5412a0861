use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ballot contents, opaque to this crate.
pub type BallotContent = Map<String, Value>;

/// Field under which the ballot ID is serialized alongside the contents.
const ID_FIELD: &str = "id";

/// A pseudonymous ballot identifier: lowercase hex of the keyed hash
/// of the voter identity under the vote's secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BallotId(String);

impl BallotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BallotId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<BallotId> for String {
    fn from(id: BallotId) -> Self {
        id.0
    }
}

impl Display for BallotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ballot with its derived ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: BallotId,
    #[serde(flatten)]
    pub content: BallotContent,
}

impl Ballot {
    /// Attach an ID to the given contents. Any voter-supplied `id` field is discarded.
    pub fn new(id: BallotId, mut content: BallotContent) -> Self {
        content.remove(ID_FIELD);
        Self { id, content }
    }
}
