//! Derivation of pseudonymous ballot IDs.
//!
//! A ballot ID is `HMAC-SHA256(key = secret, msg = DOMAIN || 0x00 || voter)`,
//! where `secret` is the UTF-8 of the vote's secret, `voter` is the UTF-8 of
//! the voter identity, and the digest is rendered as 64 lowercase hex
//! characters. The ID is stable for a given voter and vote, and cannot be
//! linked back to the voter without the secret.

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::model::{ballot::BallotId, secret::VoteSecret};

pub type HmacSha256 = Hmac<Sha256>;

/// Versioned domain separation tag. Changing the layout requires a new tag.
pub const DOMAIN: &[u8] = b"ballot-id/v1";

/// Derive the ballot ID of `voter` for the vote holding `secret`.
pub fn derive_ballot_id(secret: &VoteSecret, voter: &str) -> BallotId {
    let mut hmac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    hmac.update(DOMAIN);
    hmac.update(&[0]);
    hmac.update(voter.as_bytes());
    HEXLOWER.encode(&hmac.finalize().into_bytes()).into()
}
