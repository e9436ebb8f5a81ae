use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported image type '{value}': expected image/png or image/jpeg")]
pub struct ParseMimeError {
    pub value: String,
}

impl ParseMimeError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported output format '{value}': expected png or jpeg")]
pub struct ParseFormatError {
    pub value: String,
}

impl ParseFormatError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}
