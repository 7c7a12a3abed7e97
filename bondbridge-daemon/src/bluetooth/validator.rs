use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Device address is null")]
    MissingAddress,
}

impl ValidationError {
    /// Error code reported to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingAddress => "INVALID_ARGUMENT",
        }
    }
}

/// Gate a bond request on the presence of an address.
///
/// The address itself is passed through untouched; its format is checked
/// when the adapter resolves the device.
pub fn validate(raw_address: Option<&str>) -> Result<String, ValidationError> {
    raw_address
        .map(str::to_owned)
        .ok_or(ValidationError::MissingAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_address_passes_unchanged() {
        for address in ["00:1A:7D:DA:71:13", "dc:2c:26:0f:44:a1", "not-an-address"] {
            assert_eq!(validate(Some(address)).as_deref(), Ok(address));
        }
    }

    #[test]
    fn missing_address_is_invalid_argument() {
        let err = validate(None).unwrap_err();
        assert_eq!(err, ValidationError::MissingAddress);
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert_eq!(err.to_string(), "Device address is null");
    }
}
