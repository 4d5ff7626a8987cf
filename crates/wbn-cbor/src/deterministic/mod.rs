//! Deterministic CBOR verification (RFC 8949 §4.2.1).
//!
//! The verifier walks raw bytes without building values, so it can check
//! input that came from any encoder. A sequence of zero or more items is
//! accepted when every item:
//!
//! - uses the shortest argument width for integers, lengths and counts
//! - has a definite length
//! - has map keys in strictly increasing bytewise order of their encodings
//!
//! # DoS Protection
//!
//! - Containers are tracked on an explicit stack, never by recursion
//! - Nesting deeper than [`MAX_NESTING_DEPTH`] is rejected
//! - String lengths are checked against the remaining input before slicing
//!
//! # Usage
//!
//! ```
//! use wbn_cbor::{check_deterministic, DeterminismError};
//!
//! // {"hello": 1, "hello2": 2}
//! let ok = [
//!     0xa2, 0x65, b'h', b'e', b'l', b'l', b'o', 0x01,
//!     0x66, b'h', b'e', b'l', b'l', b'o', b'2', 0x02,
//! ];
//! assert!(check_deterministic(&ok).is_ok());
//!
//! // 45 padded to two argument bytes
//! let padded = [0x19, 0x00, 0x2d];
//! assert!(matches!(
//!     check_deterministic(&padded),
//!     Err(DeterminismError::NonMinimalArgument { value: 45, .. })
//! ));
//! ```

mod errors;
mod head;


pub use errors::{DeterminismError, MAX_NESTING_DEPTH};

use head::{read_head, MajorType};

/// Open container on the walk stack.
struct Frame {
    /// Offset of the container's lead byte.
    start: usize,
    is_map: bool,
    /// Child items expected (a map counts keys and values separately).
    expected: u64,
    done: u64,
    /// Byte range of the previous key, maps only.
    prev_key: Option<(usize, usize)>,
    /// Start of the item currently being read as a key.
    key_start: usize,
}

/// Check that `input` is a sequence of deterministically encoded CBOR items.
///
/// Empty input is valid. The error carries the offset of the first
/// offending item.
pub fn check_deterministic(input: &[u8]) -> Result<(), DeterminismError> {
    let mut pos = 0usize;
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        // Close every container whose children are all read.
        while let Some(frame) = stack.last() {
            if frame.done < frame.expected {
                break;
            }
            stack.pop();
            complete_item(&mut stack, input, pos)?;
        }

        if pos >= input.len() {
            return match stack.last() {
                None => Ok(()),
                Some(frame) => Err(DeterminismError::TooFewItems {
                    offset: frame.start,
                    expected: if frame.is_map {
                        frame.expected / 2
                    } else {
                        frame.expected
                    },
                    found: if frame.is_map {
                        frame.done / 2
                    } else {
                        frame.done
                    },
                }),
            };
        }

        if let Some(frame) = stack.last_mut() {
            if frame.is_map && frame.done % 2 == 0 {
                frame.key_start = pos;
            }
        }

        let offset = pos;
        // break stops and indefinite heads, whatever the major type
        if input[offset] & 0x1f == 31 {
            return Err(DeterminismError::IndefiniteLength { offset });
        }
        reject_unsupported(input[offset], offset)?;
        let head = read_head(input, offset)?;
        pos += head.len;

        match head.major {
            MajorType::Bytes | MajorType::Text => {
                let available = input.len() - pos;
                if head.argument > available as u64 {
                    return Err(DeterminismError::StringExceedsInput {
                        offset,
                        declared: head.argument,
                        available,
                    });
                }
                pos += head.argument as usize;
                complete_item(&mut stack, input, pos)?;
            }
            MajorType::Array | MajorType::Map => {
                let is_map = head.major == MajorType::Map;
                let expected = if is_map {
                    // Each pair needs at least two bytes, so an overflowing
                    // count would run out of input anyway.
                    head.argument.saturating_mul(2)
                } else {
                    head.argument
                };
                if stack.len() >= MAX_NESTING_DEPTH {
                    return Err(DeterminismError::NestingTooDeep {
                        offset,
                        depth: stack.len() + 1,
                    });
                }
                stack.push(Frame {
                    start: offset,
                    is_map,
                    expected,
                    done: 0,
                    prev_key: None,
                    key_start: pos,
                });
            }
            // Unsigned integers and simple values.
            _ => complete_item(&mut stack, input, pos)?,
        }
    }
}

/// Whether `input` is a sequence of deterministically encoded CBOR items.
pub fn is_deterministic(input: &[u8]) -> bool {
    check_deterministic(input).is_ok()
}

/// Negative integers, tags and floats are outside the supported subset.
/// Of major type 7 only false, true, null and undefined are accepted.
fn reject_unsupported(lead: u8, offset: usize) -> Result<(), DeterminismError> {
    let major = MajorType::from_lead(lead);
    let supported = match major {
        MajorType::Negative | MajorType::Tag => false,
        MajorType::Simple => matches!(lead, 0xf4..=0xf7),
        _ => true,
    };
    if supported {
        Ok(())
    } else {
        Err(DeterminismError::NotImplemented {
            offset,
            major_type: major.code(),
        })
    }
}

/// Record a finished child in the innermost open container, checking map
/// key order when the child was a key.
fn complete_item(stack: &mut [Frame], input: &[u8], end: usize) -> Result<(), DeterminismError> {
    let Some(frame) = stack.last_mut() else {
        return Ok(());
    };

    if frame.is_map && frame.done % 2 == 0 {
        let current = &input[frame.key_start..end];
        if let Some((prev_start, prev_end)) = frame.prev_key {
            let previous = &input[prev_start..prev_end];
            match previous.cmp(current) {
                std::cmp::Ordering::Less => {}
                std::cmp::Ordering::Equal => {
                    return Err(DeterminismError::DuplicateKey {
                        offset: frame.key_start,
                        key: hex::encode(current),
                    });
                }
                std::cmp::Ordering::Greater => {
                    return Err(DeterminismError::KeysNotOrdered {
                        offset: frame.key_start,
                        previous: hex::encode(previous),
                        current: hex::encode(current),
                    });
                }
            }
        }
        frame.prev_key = Some((frame.key_start, end));
    }

    frame.done += 1;
    Ok(())
}
