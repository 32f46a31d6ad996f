//! Conversion options as read from the form at conversion time

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FILENAME: &str = "my_document";

/// Image quality slider value
///
/// Displayed to the user but not passed to the compression step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 10;
    pub const MAX: u8 = 100;
    pub const STEP: u8 = 5;

    pub fn new(value: u8) -> Result<Self, ConvertError> {
        if !(Self::MIN..=Self::MAX).contains(&value) || value % Self::STEP != 0 {
            return Err(ConvertError::InvalidOption(format!(
                "quality must be between {} and {} in steps of {}, got {}",
                Self::MIN,
                Self::MAX,
                Self::STEP,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

impl TryFrom<u8> for Quality {
    type Error = ConvertError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    pub filename: String,
    pub title: String,
    pub compress: bool,
    pub quality: Quality,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            title: String::new(),
            compress: false,
            quality: Quality::default(),
        }
    }
}

impl ConversionOptions {
    /// Name offered for download; ".pdf" is always appended
    pub fn download_filename(&self) -> String {
        format!("{}.pdf", self.filename)
    }

    /// Whether the rewrite step has anything to do
    pub fn needs_rewrite(&self) -> bool {
        !self.title.is_empty() || self.compress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConversionOptions::default();
        assert_eq!(options.filename, "my_document");
        assert_eq!(options.title, "");
        assert!(!options.compress);
        assert_eq!(options.quality.value(), 75);
        assert!(!options.needs_rewrite());
    }

    #[test]
    fn test_download_filename_always_appends_extension() {
        let mut options = ConversionOptions {
            filename: "report".into(),
            ..Default::default()
        };
        assert_eq!(options.download_filename(), "report.pdf");

        options.filename = "report.pdf".into();
        assert_eq!(options.download_filename(), "report.pdf.pdf");
    }

    #[test]
    fn test_needs_rewrite() {
        let titled = ConversionOptions {
            title: "Report".into(),
            ..Default::default()
        };
        assert!(titled.needs_rewrite());

        let compressed = ConversionOptions {
            compress: true,
            ..Default::default()
        };
        assert!(compressed.needs_rewrite());
    }

    #[test]
    fn test_quality_bounds_and_step() {
        assert!(Quality::new(10).is_ok());
        assert!(Quality::new(100).is_ok());
        assert!(Quality::new(55).is_ok());
        assert!(Quality::new(5).is_err());
        assert!(Quality::new(105).is_err());
        assert!(Quality::new(72).is_err());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ConversionOptions =
            serde_json::from_str(r#"{"title":"Holiday","quality":40}"#).unwrap();
        assert_eq!(options.filename, "my_document");
        assert_eq!(options.title, "Holiday");
        assert_eq!(options.quality.value(), 40);

        let invalid = serde_json::from_str::<ConversionOptions>(r#"{"quality":41}"#);
        assert!(invalid.is_err());
    }
}
