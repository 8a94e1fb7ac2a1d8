//! Response mapper: raw reply to typed result.
//!
//! # Design
//! Each response kind implements [`FromRecord`], reading its fields through a
//! [`Record`] view of the JSON object. The view looks fields up by their
//! snake_case name translated through the connector's [`FieldNaming`] and
//! tracks the path from the document root, so a failure reports exactly which
//! field was wrong, in the backend's spelling (`hits[1].name`).
//!
//! Implementations read every field with `?` and construct the value last,
//! so a record is either fully populated or not produced at all.

use std::fmt::Display;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::naming::FieldNaming;
use crate::request::json_type;
use crate::transport::classify_status;

/// Conversion from one validated JSON object into a typed record.
pub trait FromRecord: Sized {
    fn from_record(record: &Record<'_>) -> Result<Self, ApiError>;
}

/// Path-tracking, naming-aware view of a JSON object.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    fields: &'a Map<String, Value>,
    path: String,
    naming: FieldNaming,
}

const ROOT: &str = "$";

impl<'a> Record<'a> {
    /// View the document root. Fails unless `value` is an object.
    pub fn root(value: &'a Value, naming: FieldNaming) -> Result<Self, ApiError> {
        Self::at(value, ROOT.to_string(), naming)
    }

    fn at(value: &'a Value, path: String, naming: FieldNaming) -> Result<Self, ApiError> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
                path,
                naming,
            }),
            other => Err(ApiError::validation(
                path,
                format!("expected object, found {}", json_type(other)),
            )),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Validation error for `field` of this record.
    pub fn invalid(&self, field: &str, reason: impl Into<String>) -> ApiError {
        ApiError::validation(self.field_path(field), reason)
    }

    fn field_path(&self, field: &str) -> String {
        let wire = self.naming.apply(field);
        if self.path == ROOT {
            wire
        } else {
            format!("{}.{wire}", self.path)
        }
    }

    /// Field value; explicit `null` counts as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields
            .get(&self.naming.apply(field))
            .filter(|value| !value.is_null())
    }

    pub fn required(&self, field: &str) -> Result<&'a Value, ApiError> {
        self.get(field)
            .ok_or_else(|| self.invalid(field, "missing required field"))
    }

    fn typed<T>(
        &self,
        field: &str,
        expected: &str,
        value: &'a Value,
        convert: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, ApiError> {
        convert(value).ok_or_else(|| {
            self.invalid(field, format!("expected {expected}, found {}", json_type(value)))
        })
    }

    pub fn required_str(&self, field: &str) -> Result<String, ApiError> {
        let value = self.required(field)?;
        self.typed(field, "string", value, |v| v.as_str().map(str::to_string))
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<String>, ApiError> {
        self.get(field)
            .map(|value| self.typed(field, "string", value, |v| v.as_str().map(str::to_string)))
            .transpose()
    }

    pub fn required_u64(&self, field: &str) -> Result<u64, ApiError> {
        let value = self.required(field)?;
        self.typed(field, "unsigned integer", value, Value::as_u64)
    }

    pub fn optional_u64(&self, field: &str) -> Result<Option<u64>, ApiError> {
        self.get(field)
            .map(|value| self.typed(field, "unsigned integer", value, Value::as_u64))
            .transpose()
    }

    pub fn required_f64(&self, field: &str) -> Result<f64, ApiError> {
        let value = self.required(field)?;
        self.typed(field, "number", value, Value::as_f64)
    }

    /// String field parsed into a tagged variant.
    pub fn required_enum<T>(&self, field: &str) -> Result<T, ApiError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required_str(field)?;
        raw.parse().map_err(|e: T::Err| self.invalid(field, e.to_string()))
    }

    pub fn optional_enum<T>(&self, field: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional_str(field)?
            .map(|raw| raw.parse().map_err(|e: T::Err| self.invalid(field, e.to_string())))
            .transpose()
    }

    pub fn required_record(&self, field: &str) -> Result<Record<'a>, ApiError> {
        let value = self.required(field)?;
        Record::at(value, self.field_path(field), self.naming)
    }

    /// Nested object converted through its own `FromRecord`.
    pub fn nested<T: FromRecord>(&self, field: &str) -> Result<T, ApiError> {
        T::from_record(&self.required_record(field)?)
    }

    pub fn optional_nested<T: FromRecord>(&self, field: &str) -> Result<Option<T>, ApiError> {
        match self.get(field) {
            Some(value) => {
                let record = Record::at(value, self.field_path(field), self.naming)?;
                T::from_record(&record).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn required_list<T: FromRecord>(&self, field: &str) -> Result<Vec<T>, ApiError> {
        let value = self.required(field)?;
        self.list(field, value)
    }

    /// List that backends omit when empty; absence maps to an empty `Vec`.
    pub fn optional_list<T: FromRecord>(&self, field: &str) -> Result<Vec<T>, ApiError> {
        match self.get(field) {
            Some(value) => self.list(field, value),
            None => Ok(Vec::new()),
        }
    }

    fn list<T: FromRecord>(&self, field: &str, value: &'a Value) -> Result<Vec<T>, ApiError> {
        let items = self.typed(field, "array", value, Value::as_array)?;
        let base = self.field_path(field);
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let record = Record::at(item, format!("{base}[{i}]"), self.naming)?;
                T::from_record(&record)
            })
            .collect()
    }
}

/// Classify the status of `response`, then validate and convert its body.
pub fn map_response<R: FromRecord>(response: &HttpResponse, naming: FieldNaming) -> Result<R, ApiError> {
    classify_status(response)?;
    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::validation(ROOT, format!("body is not valid JSON: {e}")))?;
    R::from_record(&Record::root(&value, naming)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::MarketType;

    #[derive(Debug, PartialEq)]
    struct Quote {
        ticker: String,
        market_type: MarketType,
        last_price: f64,
        volume: Option<u64>,
    }

    impl FromRecord for Quote {
        fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
            Ok(Self {
                ticker: record.required_str("ticker")?,
                market_type: record.required_enum("market_type")?,
                last_price: record.required_f64("last_price")?,
                volume: record.optional_u64("volume")?,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Board {
        quotes: Vec<Quote>,
        best: Option<Quote>,
    }

    impl FromRecord for Board {
        fn from_record(record: &Record<'_>) -> Result<Self, ApiError> {
            Ok(Self {
                quotes: record.required_list("quotes")?,
                best: record.optional_nested("best_quote")?,
            })
        }
    }

    fn ok(body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn validation_path(err: ApiError) -> String {
        match err {
            ApiError::Validation { path, .. } => path,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn maps_nested_records() {
        let body = json!({
            "quotes": [
                {"ticker": "ACME", "marketType": "stock", "lastPrice": 12.5, "volume": 100},
                {"ticker": "ACB", "marketType": "bond", "lastPrice": 99.1, "volume": null},
            ],
        });
        let board: Board = map_response(&ok(body), FieldNaming::CamelCase).unwrap();
        assert_eq!(board.quotes.len(), 2);
        assert_eq!(board.quotes[0].market_type, MarketType::Stock);
        assert_eq!(board.quotes[1].volume, None);
        assert!(board.best.is_none());
    }

    #[test]
    fn missing_field_reports_wire_path() {
        let body = json!({
            "quotes": [
                {"ticker": "ACME", "marketType": "stock", "lastPrice": 12.5},
                {"ticker": "ACB", "marketType": "bond"},
            ],
        });
        let err = map_response::<Board>(&ok(body), FieldNaming::CamelCase).unwrap_err();
        assert_eq!(validation_path(err), "quotes[1].lastPrice");
    }

    #[test]
    fn wrong_type_reports_expected_type() {
        let body = json!({"quotes": [{"ticker": 7, "marketType": "stock", "lastPrice": 1.0}]});
        let err = map_response::<Board>(&ok(body), FieldNaming::CamelCase).unwrap_err();
        assert!(err.to_string().contains("expected string, found number"));
        assert_eq!(validation_path(err), "quotes[0].ticker");
    }

    #[test]
    fn unknown_variant_is_a_validation_error() {
        let body = json!({"quotes": [], "bestQuote": {"ticker": "X", "marketType": "warrant", "lastPrice": 1.0}});
        let err = map_response::<Board>(&ok(body), FieldNaming::CamelCase).unwrap_err();
        assert_eq!(validation_path(err), "bestQuote.marketType");
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = map_response::<Board>(&ok(json!([1, 2])), FieldNaming::AsIs).unwrap_err();
        assert_eq!(validation_path(err), "$");
    }

    #[test]
    fn invalid_json_is_rejected() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "not json".to_string(),
        };
        let err = map_response::<Board>(&response, FieldNaming::AsIs).unwrap_err();
        assert_eq!(validation_path(err), "$");
    }

    #[test]
    fn status_is_classified_before_body() {
        let response = HttpResponse {
            status: 401,
            headers: Vec::new(),
            body: "not json".to_string(),
        };
        let err = map_response::<Board>(&response, FieldNaming::AsIs).unwrap_err();
        assert!(matches!(err, ApiError::Authentication { status: 401, .. }));
    }
}
