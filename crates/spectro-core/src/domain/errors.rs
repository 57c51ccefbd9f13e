use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SpectroResult<T> = Result<T, SpectroError>;
pub type ParserResult<T> = SpectroResult<T>;
pub type StoreResult<T> = SpectroResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectroErrorCategory {
    Success,
    InputValidationError,
    FormatError,
    SourceUnavailableError,
    NotFoundError,
    StorageError,
    InternalError,
}

impl SpectroErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::FormatError => 3,
            Self::SourceUnavailableError => 4,
            Self::NotFoundError => 5,
            Self::StorageError => 6,
            Self::InternalError => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::FormatError => "FormatError",
            Self::SourceUnavailableError => "SourceUnavailableError",
            Self::NotFoundError => "NotFoundError",
            Self::StorageError => "StorageError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl Display for SpectroErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectroError {
    category: SpectroErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl SpectroError {
    pub fn new(
        category: SpectroErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            SpectroErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn format(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::FormatError, placeholder, message)
    }

    pub fn source_unavailable(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            SpectroErrorCategory::SourceUnavailableError,
            placeholder,
            message,
        )
    }

    pub fn not_found(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::NotFoundError, placeholder, message)
    }

    pub fn storage(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::StorageError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SpectroErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> SpectroErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self.category, SpectroErrorCategory::NotFoundError)
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for SpectroError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for SpectroError {}

#[cfg(test)]
mod tests {
    use super::{SpectroError, SpectroErrorCategory};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (SpectroErrorCategory::Success, 0, "Success"),
            (
                SpectroErrorCategory::InputValidationError,
                2,
                "InputValidationError",
            ),
            (SpectroErrorCategory::FormatError, 3, "FormatError"),
            (
                SpectroErrorCategory::SourceUnavailableError,
                4,
                "SourceUnavailableError",
            ),
            (SpectroErrorCategory::NotFoundError, 5, "NotFoundError"),
            (SpectroErrorCategory::StorageError, 6, "StorageError"),
            (SpectroErrorCategory::InternalError, 7, "InternalError"),
        ];

        for (category, exit_code, name) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), name);
            assert_eq!(category.is_fatal(), exit_code != 0);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = SpectroError::format(
            "FORMAT.FIELD_COUNT",
            "line 8: expected 5 ';'-separated fields, found 3",
        );

        assert_eq!(error.exit_code(), 3);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [FORMAT.FIELD_COUNT] line 8: expected 5 ';'-separated fields, found 3"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 3")
        );
        assert_eq!(
            error.to_string(),
            "FormatError [FORMAT.FIELD_COUNT] line 8: expected 5 ';'-separated fields, found 3"
        );
    }

    #[test]
    fn not_found_is_distinguishable_from_other_failures() {
        let missing = SpectroError::not_found("LOOKUP.PROCESSING_CONFIG", "no config 9");
        let broken = SpectroError::storage("STORE.WRITE", "disk full");

        assert!(missing.is_not_found());
        assert!(!broken.is_not_found());
        assert_eq!(missing.category(), SpectroErrorCategory::NotFoundError);
    }
}
