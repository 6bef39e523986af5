use crate::error::ReportError;
use crate::query::normalize_term;
use crate::render::Format;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

pub const YEAR_RANGE: RangeInclusive<i32> = 1950..=2100;

/// Raw query-string options of one request. Only the first value of a
/// repeated key is used; unknown keys are ignored.
#[derive(Clone, Debug, Default)]
pub struct Params {
    values: HashMap<String, Vec<String>>,
}

impl Params {
    pub fn parse(raw: Option<String>) -> Self {
        let raw = raw.unwrap_or_default();
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
            values.entry(k.to_string()).or_default().push(v.to_string());
        }
        Self { values }
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|vals| vals.first())
            .map(String::as_str)
    }

    /// Optional search text; blank counts as absent.
    pub fn search(&self, key: &str) -> Option<String> {
        self.first(key).and_then(normalize_term)
    }

    /// Text with a default when absent. Present but blank is rejected.
    pub fn text_or(&self, key: &'static str, default: &str) -> Result<String, ReportError> {
        match self.first(key) {
            None => Ok(default.to_string()),
            Some(raw) => {
                normalize_term(raw).ok_or_else(|| ReportError::invalid(key, "must not be blank"))
            }
        }
    }

    pub fn required_text(&self, key: &'static str) -> Result<String, ReportError> {
        self.first(key)
            .and_then(normalize_term)
            .ok_or_else(|| ReportError::invalid(key, "is required"))
    }

    fn number<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ReportError> {
        let Some(raw) = self.first(key).map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|_| ReportError::invalid(key, format!("{:?} is not a valid number", raw)))
    }

    pub fn year(&self, key: &'static str, default: i32) -> Result<i32, ReportError> {
        let year = self.number::<i32>(key)?.unwrap_or(default);
        if !YEAR_RANGE.contains(&year) {
            return Err(ReportError::invalid(
                key,
                format!(
                    "{} is outside {}..={}",
                    year,
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end()
                ),
            ));
        }
        Ok(year)
    }

    pub fn limit(&self, default: u32, max: u32) -> Result<u32, ReportError> {
        let limit = self.number::<i64>("limit")?.unwrap_or(default.into());
        if limit < 1 || limit > max.into() {
            return Err(ReportError::invalid(
                "limit",
                format!("{} is outside 1..={}", limit, max),
            ));
        }
        Ok(limit as u32)
    }

    pub fn min_sales(&self) -> Result<Option<f64>, ReportError> {
        let Some(min) = self.number::<f64>("min_sales")? else {
            return Ok(None);
        };
        if !min.is_finite() || min < 0.0 {
            return Err(ReportError::invalid(
                "min_sales",
                "must be a non-negative number of millions",
            ));
        }
        Ok(Some(min))
    }

    pub fn format(&self) -> Result<Format, ReportError> {
        match self.first("format") {
            None => Ok(Format::default()),
            Some(raw) => Format::parse(raw).ok_or_else(|| {
                ReportError::invalid("format", format!("{:?} is not one of table, data", raw))
            }),
        }
    }

    /// The same options re-encoded with `key` replaced, keys sorted.
    pub fn encode_with(&self, key: &str, value: &str) -> String {
        let mut params = self.values.clone();
        params.insert(key.to_string(), vec![value.to_string()]);
        encode_params(&params)
    }
}

pub fn encode_params(params: &HashMap<String, Vec<String>>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    let mut keys: Vec<_> = params.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(values) = params.get(key) {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(raw: &str) -> Params {
        Params::parse(Some(raw.to_string()))
    }

    #[test]
    fn defaults_apply_when_absent() {
        let p = params("");
        assert_eq!(p.year("year", 2010).unwrap(), 2010);
        assert_eq!(p.limit(10, 1000).unwrap(), 10);
        assert_eq!(p.min_sales().unwrap(), None);
        assert_eq!(p.format().unwrap(), Format::Table);
        assert_eq!(p.text_or("platform", "psp").unwrap(), "psp");
        assert_eq!(p.search("name"), None);
    }

    #[test]
    fn decoded_values_are_used() {
        let p = params("name=Electronic+Arts&min_sales=1.5&limit=5&format=json&year=1998");
        assert_eq!(p.search("name").as_deref(), Some("Electronic Arts"));
        assert_eq!(p.min_sales().unwrap(), Some(1.5));
        assert_eq!(p.limit(10, 1000).unwrap(), 5);
        assert_eq!(p.format().unwrap(), Format::Data);
        assert_eq!(p.year("year", 2010).unwrap(), 1998);
    }

    #[test]
    fn unparseable_numbers_are_validation_errors() {
        let err = params("year=twenty").year("year", 2010).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter `year`: \"twenty\" is not a valid number"
        );
        assert!(params("limit=ten").limit(10, 1000).is_err());
        assert!(params("min_sales=lots").min_sales().is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(params("year=1066").year("year", 2010).is_err());
        assert!(params("decade=3000").year("decade", 2000).is_err());
        assert!(params("limit=0").limit(10, 1000).is_err());
        assert!(params("limit=1001").limit(10, 1000).is_err());
        assert!(params("min_sales=-1").min_sales().is_err());
        assert!(params("min_sales=NaN").min_sales().is_err());
        assert!(params("format=csv").format().is_err());
    }

    #[test]
    fn required_and_blank_text() {
        assert!(params("").required_text("publisher1").is_err());
        assert!(params("publisher1=+++").required_text("publisher1").is_err());
        assert_eq!(params("publisher1=Sega").required_text("publisher1").unwrap(), "Sega");
        assert!(params("region=").text_or("region", "japan").is_err());
        assert_eq!(params("name=").search("name"), None);
    }

    #[test]
    fn first_value_wins() {
        let p = params("limit=3&limit=7");
        assert_eq!(p.limit(10, 1000).unwrap(), 3);
    }

    #[test]
    fn encode_with_replaces_key() {
        let p = params("platform=psp&format=table");
        assert_eq!(p.encode_with("format", "data"), "format=data&platform=psp");
    }
}
