pub mod ballot;
pub mod device;
pub mod secret;
pub mod view;
pub mod vote;

pub use ballot::{Ballot, BallotContent, BallotId};
pub use device::RegisteredDevice;
pub use secret::VoteSecret;
pub use view::VoteView;
pub use vote::{Vote, VoteAndBallots, VoteId, VoteMetadata, VoteState};
