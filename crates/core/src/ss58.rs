//! SS58 address codec.
//!
//! Only the single-byte prefix form used by Bittensor (`42`) with a 32-byte account id is
//! supported. Layout of the decoded payload:
//!
//! ```text
//! prefix (1) || account id (32) || checksum (2)
//! ```
//!
//! where `checksum = blake2b_512("SS58PRE" || prefix || account)[..2]`.

use blake2::{Blake2b512, Digest};

use crate::constants::{SS58_ADDRESS_LEN, SS58_FORMAT};
use crate::error::{CoreError, Result};

const CHECKSUM_PREIMAGE_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const ACCOUNT_LEN: usize = 32;
const PAYLOAD_LEN: usize = 1 + ACCOUNT_LEN + CHECKSUM_LEN;

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(CHECKSUM_PREIMAGE_PREFIX);
    hasher.update(body);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

/// Encode a 32-byte account id as a prefix-42 SS58 string.
pub fn encode(account: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.push(SS58_FORMAT);
    payload.extend_from_slice(account);
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    bs58::encode(payload).into_string()
}

/// Decode a prefix-42 SS58 string into its 32-byte account id.
///
/// Rejects strings that are not exactly 48 characters, are not base58, carry another
/// network prefix, or fail the checksum.
pub fn decode(address: &str) -> Result<[u8; 32]> {
    if address.len() != SS58_ADDRESS_LEN {
        return Err(CoreError::InvalidAddressLength(address.len()));
    }

    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|e| CoreError::InvalidAddress(e.to_string()))?;

    if payload.len() != PAYLOAD_LEN {
        return Err(CoreError::InvalidAddressLength(payload.len()));
    }
    if payload[0] != SS58_FORMAT {
        return Err(CoreError::InvalidPrefix(payload[0]));
    }

    let (body, sum) = payload.split_at(1 + ACCOUNT_LEN);
    if checksum(body) != sum {
        return Err(CoreError::InvalidChecksum);
    }

    let mut account = [0u8; ACCOUNT_LEN];
    account.copy_from_slice(&body[1..]);
    Ok(account)
}

/// Returns true if `address` is a valid prefix-42 SS58 address.
pub fn is_valid(address: &str) -> bool {
    decode(address).is_ok()
}
