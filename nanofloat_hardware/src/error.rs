use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("gpio pin {pin} unavailable: {reason}")]
    PinUnavailable { pin: u8, reason: String },
    #[error("encoder interrupt setup failed: {0}")]
    Interrupt(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
