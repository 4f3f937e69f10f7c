//! Record surface returned by specialization-aware queries.
//!
//! Every resolved record implements [`Specialized`]: it knows its primary key,
//! the specialization label stored on its row, and the path of the concrete
//! type it was materialized as. Custom accessors may return their own typed
//! structs; the generic table accessor returns [`SpecializedRow`].

use crate::core::paths::SpecializationPath;
use rusqlite::types::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Primary key type for all store-backed records.
pub type RecordId = i64;

pub trait Specialized: fmt::Debug {
    fn id(&self) -> RecordId;

    /// The specialization label stored on the row. For a final specialization
    /// this names the row's own leaf type.
    fn specialization(&self) -> &SpecializationPath;

    /// The path of the concrete type this instance was materialized as.
    fn declared_path(&self) -> &SpecializationPath;

    fn type_name(&self) -> &str;

    /// Columns loaded on this instance, in stable order.
    fn columns(&self) -> Vec<&str>;

    fn value(&self, column: &str) -> Option<&Value>;

    fn as_any(&self) -> &dyn Any;
}

/// Generic row representation produced by table-backed accessors.
#[derive(Debug, Clone)]
pub struct SpecializedRow {
    id: RecordId,
    specialization: SpecializationPath,
    declared: SpecializationPath,
    type_name: String,
    values: BTreeMap<String, Value>,
}

impl SpecializedRow {
    pub fn new(
        id: RecordId,
        specialization: SpecializationPath,
        declared: SpecializationPath,
        type_name: String,
        values: BTreeMap<String, Value>,
    ) -> Self {
        SpecializedRow {
            id,
            specialization,
            declared,
            type_name,
            values,
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.values.get(column) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        match self.values.get(column) {
            Some(Value::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.values.get(column) {
            Some(Value::Real(r)) => Some(*r),
            Some(Value::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }
}

impl Specialized for SpecializedRow {
    fn id(&self) -> RecordId {
        self.id
    }

    fn specialization(&self) -> &SpecializationPath {
        &self.specialization
    }

    fn declared_path(&self) -> &SpecializationPath {
        &self.declared
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn columns(&self) -> Vec<&str> {
        self.values.keys().map(|k| k.as_str()).collect()
    }

    fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SpecializedRow {
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::Text("Parker".to_string()));
        values.insert("length".to_string(), Value::Integer(14));
        values.insert("nib_width".to_string(), Value::Real(0.75));
        SpecializedRow::new(
            2,
            SpecializationPath::from("/pen/fountain_pen/"),
            SpecializationPath::from("/pen/fountain_pen/"),
            "FountainPen".to_string(),
            values,
        )
    }

    #[test]
    fn test_typed_value_accessors() {
        let row = sample();
        assert_eq!(row.text("name"), Some("Parker"));
        assert_eq!(row.integer("length"), Some(14));
        assert_eq!(row.real("nib_width"), Some(0.75));
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_columns_are_stable() {
        let row = sample();
        assert_eq!(row.columns(), vec!["length", "name", "nib_width"]);
    }

    #[test]
    fn test_downcast_through_as_any() {
        let row: Box<dyn Specialized> = Box::new(sample());
        assert!(row.as_any().downcast_ref::<SpecializedRow>().is_some());
        assert_eq!(row.type_name(), "FountainPen");
    }
}
