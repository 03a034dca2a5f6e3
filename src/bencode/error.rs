use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("integer {0} does not fit in a signed 64-bit value")]
    IntegerOverflow(u64),

    #[error("invalid string length")]
    InvalidStringLength,

    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("dictionary keys out of order at offset {0}")]
    UnsortedKeys(usize),

    #[error("trailing data after value")]
    TrailingData,

    #[error("nesting too deep")]
    NestingTooDeep,
}
