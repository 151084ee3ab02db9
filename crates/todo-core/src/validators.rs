//! Todo content validation and the fixed-width `bytes32` encoding.

use alloy_primitives::B256;

use crate::error::ValidationError;

/// Storage limit of the contract's `bytes32` content slot
pub const MAX_CONTENT_BYTES: usize = 32;

/// Check todo content before it is sent on-chain.
///
/// Rules run in order and the first failure wins: non-empty, not only
/// whitespace, at most 32 bytes, every byte printable ASCII (0x20..=0x7E).
/// The length rule counts bytes, so multi-byte characters are measured by
/// their UTF-8 size.
pub fn validate_todo_content(content: &str) -> Result<(), ValidationError> {
    if content.is_empty() {
        return Err(ValidationError::Empty);
    }

    if content.trim().is_empty() {
        return Err(ValidationError::WhitespaceOnly);
    }

    if content.len() > MAX_CONTENT_BYTES {
        return Err(ValidationError::TooLong);
    }

    if !content.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(ValidationError::InvalidChars);
    }

    Ok(())
}

/// Validate and right-pad content with zero bytes into a `bytes32` word
pub fn encode_content(content: &str) -> Result<B256, ValidationError> {
    validate_todo_content(content)?;

    let mut word = [0u8; MAX_CONTENT_BYTES];
    word[..content.len()].copy_from_slice(content.as_bytes());
    Ok(B256::from(word))
}

/// Decode a `bytes32` word back to text, dropping NUL padding
pub fn decode_content(word: &B256) -> String {
    let bytes: Vec<u8> = word.iter().copied().filter(|b| *b != 0).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
