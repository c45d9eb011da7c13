use serde::Deserialize;

use crate::{
    ports::TelemetryError,
    types::{Field, TelemetryReport},
};

pub const UPDATE_PATH: &str = "/update";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const HTTP_OK: u16 = 200;

pub fn update_url(base_url: &str) -> String {
    format!("{base_url}{UPDATE_PATH}")
}

pub fn last_entry_url(base_url: &str, channel_id: &str, read_api_key: &str) -> String {
    let mut url = format!("{base_url}/channels/{}/feeds/last.json", channel_id.trim());
    if !read_api_key.is_empty() {
        url.push('?');
        url.push_str(
            &form_urlencoded::Serializer::new(String::new())
                .append_pair("api_key", read_api_key)
                .finish(),
        );
    }
    url
}

/// Form-encoded body for the channel update endpoint.
pub fn encode_update(write_api_key: &str, report: &TelemetryReport) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("api_key", write_api_key)
        .append_pair(
            Field::LastCycle.key(),
            &format!("{:.3}", report.last_cycle_secs),
        )
        .append_pair(
            Field::DailyTotal.key(),
            &report.daily_total_secs.to_string(),
        )
        .append_pair(
            Field::CumulativeTotal.key(),
            &report.cumulative_total_secs.to_string(),
        )
        .finish()
}

/// Most recent feed entry, as returned by `feeds/last.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChannelEntry {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub entry_id: Option<u64>,
    #[serde(default)]
    pub field1: Option<String>,
    #[serde(default)]
    pub field2: Option<String>,
    #[serde(default)]
    pub field3: Option<String>,
}

impl ChannelEntry {
    pub fn parse(body: &[u8]) -> Result<Self, TelemetryError> {
        // An empty channel answers with the bare string "-1".
        if body.trim_ascii() == b"-1" {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|err| TelemetryError::Payload(err.to_string()))
    }

    /// Integer value of a field; fractional values are truncated.
    pub fn field(&self, field: Field) -> Result<u64, TelemetryError> {
        let raw = match field {
            Field::LastCycle => self.field1.as_deref(),
            Field::DailyTotal => self.field2.as_deref(),
            Field::CumulativeTotal => self.field3.as_deref(),
        }
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(TelemetryError::MissingField(field.index()))?;

        let value: f64 = raw
            .parse()
            .map_err(|_| TelemetryError::Payload(format!("{}={raw}", field.key())))?;
        if !value.is_finite() || value < 0.0 {
            return Err(TelemetryError::Payload(format!("{}={raw}", field.key())));
        }
        Ok(value as u64)
    }

    pub fn record_timestamp(&self) -> Result<&str, TelemetryError> {
        self.created_at
            .as_deref()
            .ok_or_else(|| TelemetryError::Payload("created_at missing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn update_body_carries_three_fields() {
        let report = TelemetryReport {
            last_cycle_secs: 42.5,
            daily_total_secs: 600,
            cumulative_total_secs: 86_400,
        };

        let body = encode_update("ABC123", &report);

        assert_eq!(
            body,
            "api_key=ABC123&field1=42.500&field2=600&field3=86400"
        );
    }

    #[test]
    fn api_key_is_form_escaped() {
        let report = TelemetryReport {
            last_cycle_secs: 0.0,
            daily_total_secs: 0,
            cumulative_total_secs: 0,
        };

        let body = encode_update("a b&c", &report);

        assert!(body.starts_with("api_key=a+b%26c&"));
    }

    #[test]
    fn parses_last_entry_feed() {
        let body = br#"{"created_at":"2026-01-16T07:12:03Z","entry_id":981,"field1":"61.204","field2":"1830","field3":"734001"}"#;

        let entry = ChannelEntry::parse(body).unwrap();

        assert_eq!(entry.entry_id, Some(981));
        assert_eq!(entry.field(Field::LastCycle).unwrap(), 61);
        assert_eq!(entry.field(Field::DailyTotal).unwrap(), 1_830);
        assert_eq!(entry.field(Field::CumulativeTotal).unwrap(), 734_001);
        assert_eq!(entry.record_timestamp().unwrap(), "2026-01-16T07:12:03Z");
    }

    #[test]
    fn null_and_missing_fields_are_reported() {
        let body = br#"{"created_at":"2026-01-16T07:12:03Z","field1":"12.0","field2":null}"#;

        let entry = ChannelEntry::parse(body).unwrap();

        assert!(matches!(
            entry.field(Field::DailyTotal),
            Err(TelemetryError::MissingField(2))
        ));
        assert!(matches!(
            entry.field(Field::CumulativeTotal),
            Err(TelemetryError::MissingField(3))
        ));
    }

    #[test]
    fn empty_channel_yields_blank_entry() {
        let entry = ChannelEntry::parse(b"-1").unwrap();

        assert_eq!(entry, ChannelEntry::default());
        assert!(entry.record_timestamp().is_err());
    }

    #[test]
    fn last_entry_url_includes_read_key() {
        assert_eq!(
            last_entry_url("https://api.thingspeak.com", "12345", "RK"),
            "https://api.thingspeak.com/channels/12345/feeds/last.json?api_key=RK"
        );
        assert_eq!(
            last_entry_url("http://localhost", "7", ""),
            "http://localhost/channels/7/feeds/last.json"
        );
    }
}
