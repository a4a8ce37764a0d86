// models/src/medical/medicine.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::MedicineId;

/// A stocked medicine. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: MedicineId,
    pub name: String,
    pub dosage: Option<String>,
    pub stock: u32,
    pub unit_price: u64,
    pub min_stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub stock: u32,
    pub unit_price: u64,
    #[serde(default = "default_min_stock")]
    pub min_stock: u32,
}

fn default_min_stock() -> u32 {
    10
}

impl NewMedicine {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(())
    }
}

impl Medicine {
    pub fn from_new(id: MedicineId, new: NewMedicine) -> Self {
        let now = Utc::now();
        Medicine {
            id,
            name: new.name.trim().to_string(),
            dosage: new.dosage,
            stock: new.stock,
            unit_price: new.unit_price,
            min_stock: new.min_stock,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_low(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// Applies a signed stock delta; `None` if it would go below zero or overflow.
    pub fn adjusted_stock(&self, delta: i64) -> Option<u32> {
        let next = i64::from(self.stock).checked_add(delta)?;
        u32::try_from(next).ok()
    }
}

/// Partial edit of a medicine's catalogue fields. Stock moves through
/// restock or dispense, never through an edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicineUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub min_stock: Option<u32>,
}

impl Medicine {
    pub fn apply(&mut self, update: MedicineUpdate) -> ValidationResult<()> {
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::MissingField("name"));
            }
            self.name = name.to_string();
        }
        if let Some(dosage) = update.dosage {
            self.dosage = Some(dosage);
        }
        if let Some(price) = update.unit_price {
            self.unit_price = price;
        }
        if let Some(min_stock) = update.min_stock {
            self.min_stock = min_stock;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medicine(stock: u32) -> Medicine {
        Medicine::from_new(
            MedicineId(1),
            NewMedicine {
                name: "Amoxicillin".into(),
                dosage: Some("500mg".into()),
                stock,
                unit_price: 1500,
                min_stock: 10,
            },
        )
    }

    #[test]
    fn adjusted_stock_never_goes_negative() {
        let m = medicine(3);
        assert_eq!(m.adjusted_stock(-3), Some(0));
        assert_eq!(m.adjusted_stock(-4), None);
        assert_eq!(m.adjusted_stock(7), Some(10));
    }

    #[test]
    fn low_stock_threshold_is_inclusive() {
        assert!(medicine(10).is_low());
        assert!(!medicine(11).is_low());
    }

    #[test]
    fn apply_rejects_blank_name() {
        let mut m = medicine(5);
        let err = m.apply(MedicineUpdate { name: Some(" ".into()), ..Default::default() });
        assert_eq!(err, Err(ValidationError::MissingField("name")));
        m.apply(MedicineUpdate { unit_price: Some(2000), ..Default::default() }).unwrap();
        assert_eq!(m.unit_price, 2000);
        assert_eq!(m.stock, 5);
    }
}
