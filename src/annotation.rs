//! Annotations: a ROI plus an optional classification.

use std::fmt;

use crate::geometry::Roi;

/// Classification identity of an annotation.
///
/// Two annotations share a class exactly when their names are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Classification(String);

impl Classification {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ROI drawn on an image.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub roi: Roi,
    pub classification: Option<Classification>,
    pub name: Option<String>,
}

impl Annotation {
    /// Creates an unclassified, unnamed annotation.
    pub fn new(roi: Roi) -> Self {
        Self {
            roi,
            classification: None,
            name: None,
        }
    }

    /// Creates an annotation with a classification.
    pub fn classified(roi: Roi, classification: Classification) -> Self {
        Self {
            roi,
            classification: Some(classification),
            name: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
