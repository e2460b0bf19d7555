use serde_json::{json, Map, Value};

/// Metadata filter for vector-store queries.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereFilter {
    Eq(String, Value),
    Ne(String, Value),
    NotIn(String, Vec<Value>),
    And(Vec<WhereFilter>),
}

impl WhereFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::NotIn(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Combine conditions; a single condition is returned bare and more than
    /// one is wrapped in an explicit `$and`.
    pub fn all(mut conditions: Vec<WhereFilter>) -> Option<Self> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Self::And(conditions)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq(field, value) => json!({ field.as_str(): value }),
            Self::Ne(field, value) => json!({ field.as_str(): { "$ne": value } }),
            Self::NotIn(field, values) => json!({ field.as_str(): { "$nin": values } }),
            Self::And(conditions) => {
                let inner: Vec<Value> = conditions.iter().map(Self::to_json).collect();
                json!({ "$and": inner })
            }
        }
    }

    /// Evaluate the filter against a document's metadata.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        match self {
            Self::Eq(field, value) => metadata.get(field).is_some_and(|v| values_equal(v, value)),
            Self::Ne(field, value) => !metadata.get(field).is_some_and(|v| values_equal(v, value)),
            Self::NotIn(field, values) => match metadata.get(field) {
                Some(v) => !values.iter().any(|candidate| values_equal(v, candidate)),
                None => true,
            },
            Self::And(conditions) => conditions.iter().all(|c| c.matches(metadata)),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_condition_is_not_wrapped() {
        let filter = WhereFilter::all(vec![WhereFilter::eq("store_id", 1)]).unwrap();
        assert_eq!(filter.to_json(), json!({"store_id": 1}));
        assert!(WhereFilter::all(Vec::new()).is_none());
    }

    #[test]
    fn test_multiple_conditions_use_and() {
        let filter = WhereFilter::all(vec![
            WhereFilter::ne("product_id", 10),
            WhereFilter::eq("store_id", 1),
        ])
        .unwrap();
        assert_eq!(
            filter.to_json(),
            json!({"$and": [{"product_id": {"$ne": 10}}, {"store_id": 1}]})
        );
    }

    #[test]
    fn test_matches_metadata() {
        let mut metadata = Map::new();
        metadata.insert("product_id".into(), json!(10));
        metadata.insert("store_id".into(), json!(1.0));

        assert!(WhereFilter::eq("store_id", 1).matches(&metadata));
        assert!(!WhereFilter::ne("product_id", 10).matches(&metadata));
        assert!(!WhereFilter::not_in("product_id", [10, 11]).matches(&metadata));
        assert!(WhereFilter::not_in("product_id", [12]).matches(&metadata));
    }
}
