use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Number;
use thiserror::Error;

/// A single filter value. Enum-like values travel as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermValue {
    Null,
    Flag(bool),
    Number(Number),
    Text(String),
}

impl TermValue {
    /// Null and empty-string values never take part in a filter.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.is_empty(),
            Self::Flag(_) | Self::Number(_) => false,
        }
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Flag(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TermValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for TermValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i32> for TermValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<i64> for TermValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for TermValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for TermValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<TermValue>> From<Option<T>> for TermValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchTermsError {
    #[error("search term '{0}' must look like field=value")]
    MissingSeparator(String),
    #[error("search term '{0}' has an empty field name")]
    EmptyField(String),
}

/// Active filter criteria keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchTerms(BTreeMap<String, TermValue>);

impl SearchTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<TermValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<TermValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&TermValue> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TermValue)> {
        self.0.iter()
    }

    /// Copy without the blank entries. Two term sets that differ only in
    /// blank entries sanitise to the same value.
    pub fn sanitized(&self) -> Self {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_blank())
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Query-string pairs, in field order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, value)| !value.is_blank())
            .map(|(field, value)| (field.clone(), value.to_string()))
            .collect()
    }

    /// Parses `field=value` arguments. `field=` yields an empty-string term,
    /// which sanitisation later drops.
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, SearchTermsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms = Self::new();
        for raw in pairs {
            let raw = raw.as_ref();
            let (field, value) = raw
                .split_once('=')
                .ok_or_else(|| SearchTermsError::MissingSeparator(raw.to_string()))?;
            let field = field.trim();
            if field.is_empty() {
                return Err(SearchTermsError::EmptyField(raw.to_string()));
            }
            terms.insert(field, value);
        }
        Ok(terms)
    }
}

impl<K: Into<String>, V: Into<TermValue>> FromIterator<(K, V)> for SearchTerms {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sanitize_drops_null_and_empty_string_terms() {
        let terms = SearchTerms::new()
            .with("status", "")
            .with("marca", "Volvo")
            .with("modelo", TermValue::Null)
            .with("ano", 2019);

        let expected = SearchTerms::new().with("marca", "Volvo").with("ano", 2019);
        assert_eq!(terms.sanitized(), expected);
        assert_eq!(expected.sanitized(), expected);
    }

    #[test]
    fn zero_and_false_are_kept() {
        let terms = SearchTerms::new().with("quantidade", 0).with("ativo", false);
        assert_eq!(terms.sanitized().len(), 2);
    }

    #[test]
    fn query_pairs_render_plain_values() {
        let terms = SearchTerms::new()
            .with("status", "EM_OPERACAO")
            .with("capacidade", 40)
            .with("placa", "");
        assert_eq!(
            terms.to_query_pairs(),
            vec![
                ("capacidade".to_string(), "40".to_string()),
                ("status".to_string(), "EM_OPERACAO".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_from_json_object_with_nulls() {
        let terms: SearchTerms =
            serde_json::from_value(json!({ "status": null, "marca": "Scania", "km": 10.5 }))
                .expect("decode terms");
        assert_eq!(terms.get("status"), Some(&TermValue::Null));
        assert_eq!(terms.sanitized().len(), 2);
    }

    #[test]
    fn parse_pairs_rejects_missing_separator() {
        assert_eq!(
            SearchTerms::parse_pairs(["marca"]),
            Err(SearchTermsError::MissingSeparator("marca".into()))
        );
        let terms = SearchTerms::parse_pairs(["marca=Volvo", "status="]).expect("parse");
        assert_eq!(terms.get("status"), Some(&TermValue::Text(String::new())));
    }
}
