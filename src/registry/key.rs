//! Entity keys and the submission id codec

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A (store, department) pair; the partition key for models
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub store: u32,
    pub dept: u32,
}

impl EntityKey {
    pub fn new(store: u32, dept: u32) -> Self {
        Self { store, dept }
    }

    /// Key from matrix cells; floats are truncated toward zero
    pub fn from_values<S: IdComponent, D: IdComponent>(store: S, dept: D) -> Self {
        Self {
            store: store.to_component().max(0) as u32,
            dept: dept.to_component().max(0) as u32,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.store, self.dept)
    }
}

impl FromStr for EntityKey {
    type Err = ForecastError;

    /// Parse the `"{store}-{dept}"` form used for extract file names
    fn from_str(s: &str) -> Result<Self> {
        let (store, dept) = s
            .split_once('-')
            .ok_or_else(|| ForecastError::InvalidInput(format!("Invalid entity key: {}", s)))?;

        let store = store
            .trim()
            .parse()
            .map_err(|_| ForecastError::InvalidInput(format!("Invalid store id: {}", store)))?;
        let dept = dept
            .trim()
            .parse()
            .map_err(|_| ForecastError::InvalidInput(format!("Invalid department id: {}", dept)))?;

        Ok(Self { store, dept })
    }
}

impl From<(u32, u32)> for EntityKey {
    fn from((store, dept): (u32, u32)) -> Self {
        Self::new(store, dept)
    }
}

/// A numeric id component; floating-point values truncate toward zero
pub trait IdComponent: Copy {
    fn to_component(self) -> i64;
}

macro_rules! int_component {
    ($($t:ty),*) => {
        $(impl IdComponent for $t {
            fn to_component(self) -> i64 {
                self as i64
            }
        })*
    };
}

int_component!(i32, i64, u32, u64, usize);

impl IdComponent for f32 {
    fn to_component(self) -> i64 {
        self.trunc() as i64
    }
}

impl IdComponent for f64 {
    fn to_component(self) -> i64 {
        self.trunc() as i64
    }
}

/// Canonical record identifier `"{store}_{dept}_{year}-{MM}-{DD}"`
pub struct RecordId;

impl RecordId {
    pub fn encode<Y, M, D>(key: &EntityKey, year: Y, month: M, day: D) -> String
    where
        Y: IdComponent,
        M: IdComponent,
        D: IdComponent,
    {
        format!(
            "{}_{}_{}-{:02}-{:02}",
            key.store,
            key.dept,
            year.to_component(),
            month.to_component(),
            day.to_component()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_month_and_day() {
        let key = EntityKey::new(1, 1);
        assert_eq!(RecordId::encode(&key, 2010, 2, 5), "1_1_2010-02-05");
        assert_eq!(RecordId::encode(&key, 2012, 11, 30), "1_1_2012-11-30");
    }

    #[test]
    fn test_encode_truncates_floats() {
        let key = EntityKey::new(12, 95);
        assert_eq!(RecordId::encode(&key, 2010.0, 2.9, 5.4), "12_95_2010-02-05");
        assert_eq!(
            RecordId::encode(&key, 2010.0f64, 2.0f64, 5.0f64),
            RecordId::encode(&key, 2010, 2, 5)
        );
    }

    #[test]
    fn test_encode_is_deterministic_and_distinct() {
        let key = EntityKey::new(3, 7);
        let a = RecordId::encode(&key, 2011, 3, 4);
        assert_eq!(a, RecordId::encode(&key, 2011, 3, 4));
        assert_ne!(a, RecordId::encode(&key, 2011, 3, 11));
    }

    #[test]
    fn test_key_parse_and_display() {
        let key: EntityKey = "45-98".parse().unwrap();
        assert_eq!(key, EntityKey::new(45, 98));
        assert_eq!(key.to_string(), "45-98");
        assert!("45".parse::<EntityKey>().is_err());
        assert!("a-1".parse::<EntityKey>().is_err());
    }

    #[test]
    fn test_key_from_values() {
        assert_eq!(EntityKey::from_values(4.0, 17.9), EntityKey::new(4, 17));
    }
}
