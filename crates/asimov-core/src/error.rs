use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("{name} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Device rejected {0}")]
    Rejected(String),

    #[error("Interrupted by shutdown")]
    Interrupted,
}

impl DeviceError {
    /// Check `value` against an inclusive range.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::OutOfRange` when `value` is outside `min..=max`.
    pub fn check(name: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(DeviceError::OutOfRange {
                name,
                value,
                min,
                max,
            })
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
