//! Output record handed to callers of the command-line reader.

use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionResult, Outcome};
use crate::errors::DriverError;

/// Outcome of one read, in the shape consumers parse.
///
/// `message` is always emitted (as `null` when absent); the readings are left
/// out of the JSON object when they never arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultData {
    #[serde(rename = "isOk")]
    pub is_ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl ResultData {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_ok: false,
            message: Some(message.into()),
            co2: None,
            temperature: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Single tab-separated line: `co2:<ppm|null>\ttemp:<celsius|null>\t`.
    pub fn to_text(&self) -> String {
        let co2 = self
            .co2
            .map_or_else(|| "null".to_string(), |ppm| ppm.to_string());
        let temp = self
            .temperature
            .map_or_else(|| "null".to_string(), format_temperature);
        format!("co2:{co2}\ttemp:{temp}\t")
    }
}

impl From<&AcquisitionResult> for ResultData {
    fn from(result: &AcquisitionResult) -> Self {
        let message = match result.outcome {
            Outcome::Completed => None,
            Outcome::TimedOut => Some(format!(
                "timed out after {:.1}s waiting for {}",
                result.elapsed.as_secs_f64(),
                result.missing().join(", ")
            )),
        };
        Self {
            is_ok: true,
            message,
            co2: result.co2,
            temperature: result.temperature,
        }
    }
}

impl From<&DriverError> for ResultData {
    fn from(err: &DriverError) -> Self {
        Self::failure(err.to_string())
    }
}

/// At least one and at most six fractional digits, trailing zeros dropped.
fn format_temperature(celsius: f64) -> String {
    let fixed = format!("{celsius:.6}");
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn result(co2: Option<u16>, temperature: Option<f64>, outcome: Outcome) -> AcquisitionResult {
        AcquisitionResult {
            co2,
            temperature,
            outcome,
            checksum_errors: 0,
            unsupported: 0,
            elapsed: Duration::from_secs(10),
        }
    }

    fn as_value(data: &ResultData) -> Value {
        serde_json::from_str(&data.to_json().unwrap()).unwrap()
    }

    #[test]
    fn completed_result_serializes_all_fields() {
        let data = ResultData::from(&result(Some(415), Some(22.5), Outcome::Completed));
        assert_eq!(
            as_value(&data),
            json!({"isOk": true, "message": null, "co2": 415, "temperature": 22.5})
        );
    }

    #[test]
    fn missing_readings_are_omitted_but_message_is_not() {
        let data = ResultData::from(&result(Some(415), None, Outcome::TimedOut));
        let value = as_value(&data);
        assert_eq!(value["isOk"], json!(true));
        assert_eq!(value["co2"], json!(415));
        assert!(value.get("temperature").is_none());
        let message = value["message"].as_str().unwrap();
        assert!(message.contains("temperature"), "{message}");
        assert!(!message.contains("co2"), "{message}");
    }

    #[test]
    fn failure_has_message_and_no_readings() {
        let err = DriverError::MultipleDevices { count: 2 };
        let data = ResultData::from(&err);
        assert_eq!(
            as_value(&data),
            json!({"isOk": false, "message": "multiple devices currently not supported (found 2)"})
        );
    }

    #[test]
    fn json_parses_back() {
        let data = ResultData::from(&result(None, Some(-3.25), Outcome::TimedOut));
        let parsed: ResultData = serde_json::from_str(&data.to_json().unwrap()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn text_line_uses_null_for_missing_values() {
        let data = ResultData::from(&result(Some(800), None, Outcome::TimedOut));
        assert_eq!(data.to_text(), "co2:800\ttemp:null\t");
    }

    #[test]
    fn temperature_text_keeps_one_to_six_decimals() {
        assert_eq!(format_temperature(21.0), "21.0");
        assert_eq!(format_temperature(2.85), "2.85");
        assert_eq!(format_temperature(-23.15), "-23.15");
        assert_eq!(format_temperature(1.0 / 3.0), "0.333333");
    }
}
