//! Lead byte decoding: major type, additional information and argument.
//!
//! The low 5 bits of the lead byte either hold the argument directly
//! (0..=23) or announce 1, 2, 4 or 8 big-endian argument bytes (24..=27).
//! 28..=30 are reserved and 31 marks indefinite length; neither is allowed
//! in deterministic CBOR.

use super::errors::DeterminismError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MajorType {
    Unsigned,
    Negative,
    Bytes,
    Text,
    Array,
    Map,
    Tag,
    Simple,
}

impl MajorType {
    pub(crate) fn from_lead(lead: u8) -> Self {
        match lead >> 5 {
            0 => Self::Unsigned,
            1 => Self::Negative,
            2 => Self::Bytes,
            3 => Self::Text,
            4 => Self::Array,
            5 => Self::Map,
            6 => Self::Tag,
            _ => Self::Simple,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Unsigned => 0,
            Self::Negative => 1,
            Self::Bytes => 2,
            Self::Text => 3,
            Self::Array => 4,
            Self::Map => 5,
            Self::Tag => 6,
            Self::Simple => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdditionalInfo {
    Direct(u8),
    OneByte,
    TwoBytes,
    FourBytes,
    EightBytes,
}

impl AdditionalInfo {
    pub(crate) fn from_lead(lead: u8, offset: usize) -> Result<Self, DeterminismError> {
        match lead & 0b0001_1111 {
            info @ 0..=23 => Ok(Self::Direct(info)),
            24 => Ok(Self::OneByte),
            25 => Ok(Self::TwoBytes),
            26 => Ok(Self::FourBytes),
            27 => Ok(Self::EightBytes),
            31 => Err(DeterminismError::IndefiniteLength { offset }),
            info => Err(DeterminismError::ReservedAdditionalInfo { offset, info }),
        }
    }

    /// Number of argument bytes following the lead byte.
    pub(crate) fn width(self) -> usize {
        match self {
            Self::Direct(_) => 0,
            Self::OneByte => 1,
            Self::TwoBytes => 2,
            Self::FourBytes => 4,
            Self::EightBytes => 8,
        }
    }

    /// Smallest argument that needs this width. Anything below it has a
    /// shorter encoding.
    pub(crate) fn lower_limit(self) -> u64 {
        match self {
            Self::Direct(_) => 0,
            Self::OneByte => 24,
            Self::TwoBytes => 1 << 8,
            Self::FourBytes => 1 << 16,
            Self::EightBytes => 1 << 32,
        }
    }
}

/// Decoded item header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Head {
    pub(crate) major: MajorType,
    pub(crate) argument: u64,
    /// Lead byte plus argument bytes.
    pub(crate) len: usize,
}

/// Read and validate the argument of the item whose lead byte is at `offset`.
///
/// Fails when the argument is not encoded in its shortest form.
pub(crate) fn read_head(input: &[u8], offset: usize) -> Result<Head, DeterminismError> {
    let lead = input[offset];
    let major = MajorType::from_lead(lead);
    let info = AdditionalInfo::from_lead(lead, offset)?;
    let width = info.width();
    let available = input.len() - offset - 1;
    if width > available {
        return Err(DeterminismError::TruncatedHeader {
            offset,
            needed: width + 1,
            available: available + 1,
        });
    }

    let argument = match info {
        AdditionalInfo::Direct(v) => u64::from(v),
        _ => input[offset + 1..offset + 1 + width]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
    };

    if argument < info.lower_limit() {
        return Err(DeterminismError::NonMinimalArgument {
            offset,
            value: argument,
            width,
        });
    }

    Ok(Head {
        major,
        argument,
        len: 1 + width,
    })
}
