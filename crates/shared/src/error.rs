use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("frame starts with {found:#04x}, expected {expected:#04x}")]
    StartByte { expected: u8, found: u8 },
    #[error("checksum mismatch: frame carries {carried:#04x}, computed {computed:#04x}")]
    Checksum { carried: u8, computed: u8 },
}
