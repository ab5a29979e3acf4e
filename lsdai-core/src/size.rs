//! Declared sizes and their gibibyte normalization.
use crate::constants::{MB_PER_GIB, MEGABYTE_UNIT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SIZE_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*([A-Za-z]+)\s*$").ok());

/// Size as declared by the catalog: a value plus the unit it was written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredSize {
    pub value: f64,
    pub unit: String,
}

impl DeclaredSize {
    #[must_use]
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Parse a label such as `"512 MB"` or `"2.1GB"`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let re = SIZE_LABEL.as_ref()?;
        let caps = re.captures(label)?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = caps.get(2)?.as_str().to_ascii_uppercase();
        Some(Self { value, unit })
    }

    /// Gibibyte-equivalent contribution.
    ///
    /// Only `MB` is scaled (by 1024); every other unit counts its value as-is.
    #[must_use]
    pub fn gib(&self) -> f64 {
        if self.unit.eq_ignore_ascii_case(MEGABYTE_UNIT) {
            self.value / MB_PER_GIB
        } else {
            self.value
        }
    }
}

impl fmt::Display for DeclaredSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", trim_number(self.value), self.unit)
    }
}

/// Human label for an aggregate expressed in gibibytes.
///
/// Totals under one gibibyte are shown in MB so small queues stay readable.
#[must_use]
pub fn format_gib(gib: f64) -> String {
    if gib <= 0.0 {
        return String::from("0 MB");
    }
    if gib < 1.0 {
        format!("{:.0} MB", gib * MB_PER_GIB)
    } else {
        format!("{gib:.2} GB")
    }
}

fn trim_number(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megabytes_are_scaled_to_gib() {
        assert!((DeclaredSize::new(512.0, "MB").gib() - 0.5).abs() < f64::EPSILON);
        assert!((DeclaredSize::new(512.0, "mb").gib() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn other_units_contribute_raw_value() {
        assert!((DeclaredSize::new(2.0, "GB").gib() - 2.0).abs() < f64::EPSILON);
        assert!((DeclaredSize::new(300.0, "KB").gib() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_labels_with_and_without_space() {
        let spaced = DeclaredSize::parse("512 MB").unwrap();
        assert_eq!(spaced, DeclaredSize::new(512.0, "MB"));
        let tight = DeclaredSize::parse("2.1gb").unwrap();
        assert_eq!(tight, DeclaredSize::new(2.1, "GB"));
        assert!(DeclaredSize::parse("huge").is_none());
        assert!(DeclaredSize::parse("").is_none());
    }

    #[test]
    fn formats_totals() {
        assert_eq!(format_gib(0.0), "0 MB");
        assert_eq!(format_gib(0.5), "512 MB");
        assert_eq!(format_gib(2.5), "2.50 GB");
        assert_eq!(DeclaredSize::new(2.0, "GB").to_string(), "2 GB");
        assert_eq!(DeclaredSize::new(1.25, "GB").to_string(), "1.25 GB");
    }
}
