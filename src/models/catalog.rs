use bigdecimal::BigDecimal;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TallyError;

/// One known loot line: the text to look for, the bucket it counts toward and
/// what a single drop is worth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub match_text: String,
    pub bucket_name: String,
    #[serde(deserialize_with = "deserialize_unit_value")]
    pub unit_value: BigDecimal,
}

impl CatalogEntry {
    pub fn new(match_text: &str, bucket_name: &str, unit_value: BigDecimal) -> Self {
        Self {
            match_text: match_text.to_string(),
            bucket_name: bucket_name.to_string(),
            unit_value,
        }
    }
}

/// Significant digits an f64 reproduces exactly from a decimal literal
const EXACT_FLOAT_DIGITS: usize = 15;

/// Read a unit value without going through binary floating point
///
/// Strings and integers are parsed exactly. A JSON number with a fraction
/// arrives as f64; its shortest round-trip form is the literal that was
/// written as long as that literal has at most 15 significant digits.
/// Longer ones are rejected and have to be quoted.
fn deserialize_unit_value<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct UnitValueVisitor;

    impl<'de> Visitor<'de> for UnitValueVisitor {
        type Value = BigDecimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal string such as \"1.5\" or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigDecimal, E> {
            BigDecimal::from_str(v.trim())
                .map_err(|e| E::custom(format!("invalid unit_value {:?}: {}", v, e)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigDecimal, E> {
            Ok(BigDecimal::from(v))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<BigDecimal, E> {
            if !v.is_finite() {
                return Err(E::custom(format!("unit_value {} is not a finite number", v)));
            }

            let literal = v.to_string();
            if significant_digits(&literal) > EXACT_FLOAT_DIGITS {
                return Err(E::custom(format!(
                    "unit_value {} has too many digits to read exactly, quote it as \"{}\"",
                    literal, literal
                )));
            }

            BigDecimal::from_str(&literal)
                .map_err(|e| E::custom(format!("invalid unit_value {}: {}", literal, e)))
        }
    }

    deserializer.deserialize_any(UnitValueVisitor)
}

/// Digits between the first and last non-zero digit of a plain decimal
fn significant_digits(literal: &str) -> usize {
    let digits: String = literal.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').trim_end_matches('0').len()
}

/// Built-in loot table: (match text, bucket, mantissa, scale).
/// The unit value is `mantissa * 10^-scale`.
const DEFAULT_ENTRIES: &[(&str, &str, i64, i64)] = &[
    ("You got Black Resurrection", "Black Resurrection Flame", 200, 0),
    ("You got Rainbow Resurrection", "Rainbow Resurrection Flame", 150, 0),
    ("You got Crimson Resurrection", "Crimson Resurrection Flame", 50, 0),
    ("You got Unextinguished x2", "Unextinguished Flame x2", 16, 0),
    ("You got Unextinguished x1", "Unextinguished Flame x1", 8, 0),
    ("You got Never-extinguishing", "Never-extinguishing Flame", 25, 0),
    ("You got Black never-extinguishing", "Black Never-extinguishing Flame", 25, 0),
    ("You got Sparkling Red", "Sparkling Red Potion", 8, 0),
    ("You got Sparkling Blue", "Sparkling Blue Potion", 15, 1),
    ("You got Amazingly Positive Chaos", "Amazingly Positive Chaos Scroll 60%", 35, 0),
    ("You got Large Boss Medal of Honor", "Large Boss Medal of Honor", 10, 0),
    ("You got Additional 50% EXP", "Additional 50% EXP Coupon", 5, 0),
    ("You got Small EXP Accumulation", "Small EXP Accumulation Potion", 8, 0),
    ("You got Suspicious Additional Cube x2", "Suspicious Additional Cube x2", 5, 0),
];

/// Ordered, read-only list of catalog entries with unique bucket names
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog, rejecting blank fields and duplicate bucket names
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, TallyError> {
        if entries.is_empty() {
            return Err(TallyError::Catalog("catalog has no entries".to_string()));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.match_text.trim().is_empty() {
                return Err(TallyError::Catalog(format!(
                    "entry for bucket '{}' has empty match text",
                    entry.bucket_name
                )));
            }
            if entry.bucket_name.trim().is_empty() {
                return Err(TallyError::Catalog(format!(
                    "entry '{}' has empty bucket name",
                    entry.match_text
                )));
            }
            if !seen.insert(entry.bucket_name.as_str()) {
                return Err(TallyError::Catalog(format!(
                    "duplicate bucket name '{}'",
                    entry.bucket_name
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Catalog used when the configuration does not provide one
    pub fn builtin() -> Self {
        let entries = DEFAULT_ENTRIES
            .iter()
            .map(|&(text, bucket, mantissa, scale)| {
                CatalogEntry::new(text, bucket, BigDecimal::new(mantissa.into(), scale))
            })
            .collect();

        Self { entries }
    }

    /// Use the configured entries, or the built-in table if none are configured
    pub fn from_config(entries: &[CatalogEntry]) -> Result<Self, TallyError> {
        if entries.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::new(entries.to_vec())
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a bucket name
    pub fn lookup(&self, bucket_name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.bucket_name == bucket_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let builtin = Catalog::builtin();
        let rebuilt = Catalog::new(builtin.entries().to_vec());

        assert!(rebuilt.is_ok(), "Built-in catalog should pass validation");
        assert_eq!(builtin.len(), 14);
    }

    #[test]
    fn test_builtin_fractional_value() {
        let catalog = Catalog::builtin();
        let entry = catalog.lookup("Sparkling Blue Potion").unwrap();

        assert_eq!(entry.unit_value, BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn test_builtin_preserves_declaration_order() {
        let catalog = Catalog::builtin();

        assert_eq!(catalog.entries()[0].bucket_name, "Black Resurrection Flame");
        assert_eq!(
            catalog.entries()[13].bucket_name,
            "Suspicious Additional Cube x2"
        );
    }

    #[test]
    fn test_duplicate_bucket_rejected() {
        let entries = vec![
            CatalogEntry::new("You got A", "Bucket", BigDecimal::from(1)),
            CatalogEntry::new("You got B", "Bucket", BigDecimal::from(2)),
        ];

        let result = Catalog::new(entries);
        assert!(result.is_err(), "Duplicate bucket names should be rejected");
    }

    #[test]
    fn test_empty_match_text_rejected() {
        let entries = vec![CatalogEntry::new("   ", "Bucket", BigDecimal::from(1))];
        assert!(Catalog::new(entries).is_err());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(Catalog::new(Vec::new()).is_err());
    }

    #[test]
    fn test_from_config_falls_back_to_builtin() {
        let catalog = Catalog::from_config(&[]).unwrap();
        assert_eq!(catalog, Catalog::builtin());
    }

    #[test]
    fn test_lookup_missing_bucket() {
        let catalog = Catalog::builtin();
        assert!(catalog.lookup("Nonexistent Bucket").is_none());
    }

    #[test]
    fn test_entry_deserializes_string_and_number_values() {
        let json = r#"[
            {"match_text": "You got X", "bucket_name": "X", "unit_value": "0.1"},
            {"match_text": "You got Y", "bucket_name": "Y", "unit_value": 200000000}
        ]"#;

        let entries: Vec<CatalogEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries[0].unit_value, BigDecimal::from_str("0.1").unwrap());
        assert_eq!(entries[1].unit_value, BigDecimal::from(200_000_000));
    }

    #[test]
    fn test_fractional_number_is_read_exactly() {
        let json = r#"[{"match_text": "You got Dust", "bucket_name": "Dust", "unit_value": 0.1}]"#;

        let entries: Vec<CatalogEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(
            entries[0].unit_value.to_string(),
            "0.1",
            "A JSON number must not pick up binary float noise"
        );
    }

    #[test]
    fn test_overlong_fractional_number_rejected() {
        let json = r#"[{"match_text": "You got Dust", "bucket_name": "Dust", "unit_value": 0.12345678901234567}]"#;

        let result: Result<Vec<CatalogEntry>, _> = serde_json::from_str(json);

        let err = result.expect_err("17 significant digits cannot be read exactly");
        assert!(err.to_string().contains("quote it"), "got {}", err);
    }

    #[test]
    fn test_invalid_string_value_rejected() {
        let json = r#"[{"match_text": "You got Dust", "bucket_name": "Dust", "unit_value": "ten"}]"#;

        let result: Result<Vec<CatalogEntry>, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_significant_digits() {
        assert_eq!(significant_digits("0.1"), 1);
        assert_eq!(significant_digits("200"), 1);
        assert_eq!(significant_digits("-12.50"), 3);
        assert_eq!(significant_digits("0.12345678901234568"), 17);
    }
}
