use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("bad frame length: {0}")]
    BadFrameLength(usize),
    #[error("payload byte {0} collides with the frame sentinel")]
    ReservedByte(u8),
}
