//! Shared types for wearable telemetry acquisition.
//!
//! This crate holds the value types passed between the fetch pool, the
//! aggregator and the stores: device identity, measurements, sessions and
//! request windows.
//!
//! # Example
//!
//! ```
//! use pulsefeed_types::{Device, DeviceId, Measurement, Metrics};
//!
//! let device = Device::new(DeviceId::parse("CE:D6:AD:45:ED:75").unwrap(), "swaid 1330");
//! let sample = Measurement::new(&device, "2025-05-15 16:23:01", Metrics {
//!     hr: Some(72.0),
//!     ..Default::default()
//! });
//! assert_eq!(sample.device_id, device.id);
//! ```

pub mod error;
pub mod types;
pub mod window;

pub use error::{ParseError, ParseResult};
pub use types::{Device, DeviceId, Measurement, Metrics, SessionId};
pub use window::{Window, format_api_timestamp, parse_api_timestamp, parse_utc_offset};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use time::macros::{datetime, offset};

    fn device() -> Device {
        Device::new(DeviceId::parse("CE:D6:AD:45:ED:75").unwrap(), "swaid 1330")
    }

    // --- DeviceId tests ---

    #[test]
    fn test_device_id_normalizes_case_and_separator() {
        let a = DeviceId::parse("ce-d6-ad-45-ed-75").unwrap();
        let b = DeviceId::parse("CE:D6:AD:45:ED:75").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "CE:D6:AD:45:ED:75");
    }

    #[test]
    fn test_device_id_trims_whitespace() {
        let id = DeviceId::parse("  ce:d6:ad:45:ed:75 ").unwrap();
        assert_eq!(id.as_str(), "CE:D6:AD:45:ED:75");
    }

    #[test]
    fn test_device_id_rejects_malformed() {
        for raw in ["", "CE:D6:AD:45:ED", "CE:D6:AD:45:ED:7", "GG:D6:AD:45:ED:75", "CED6AD45ED75"] {
            assert!(
                matches!(DeviceId::parse(raw), Err(ParseError::InvalidDeviceId(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_device_id_short() {
        assert_eq!(device().id.short(), "ED:75");
        assert_eq!(device().label(), "swaid 1330 [ED:75]");
    }

    // --- SessionId tests ---

    #[test]
    fn test_session_numeric_and_named() {
        assert_eq!(SessionId::parse(" 17 "), SessionId::Numeric(17));
        assert_eq!(SessionId::parse("demo"), SessionId::Named("demo".to_string()));
        assert_eq!(SessionId::parse("demo").to_string(), "demo");
    }

    // --- Window tests ---

    #[test]
    fn test_window_rejects_inverted() {
        let t = datetime!(2025-05-15 16:23:00 +3);
        assert!(Window::new(t, t).is_err());
        assert!(Window::new(t, t - Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_window_params_in_offset() {
        let window =
            Window::starting_at(datetime!(2025-05-15 13:23:00 UTC), Duration::from_secs(60))
                .unwrap();
        let (start, end) = window.to_params(offset!(+3)).unwrap();
        assert_eq!(start, "2025-05-15-16-23-00");
        assert_eq!(end, "2025-05-15-16-24-00");
    }

    #[test]
    fn test_parse_api_timestamp() {
        let t = window::parse_api_timestamp("2025-05-15-16-23-00", offset!(+3)).unwrap();
        assert_eq!(t, datetime!(2025-05-15 13:23:00 UTC));
        assert!(window::parse_api_timestamp("2025-05-15 16:23:00", offset!(+3)).is_err());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(window::parse_utc_offset("+03:00").unwrap(), offset!(+3));
        assert_eq!(window::parse_utc_offset("-05:30").unwrap(), offset!(-5:30));
        assert!(window::parse_utc_offset("3").is_err());
    }

    // --- Serialization tests ---

    #[test]
    fn test_measurement_serialization_keeps_field_names() {
        let m = Measurement::new(
            &device(),
            "2025-05-15 16:23:01",
            Metrics {
                hr: Some(72.0),
                si: Some(110.5),
                ..Default::default()
            },
        )
        .with_session(Some(SessionId::Numeric(7)));

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["session"], 7);
        assert_eq!(json["device_mac"], "CE:D6:AD:45:ED:75");
        assert_eq!(json["device_name"], "swaid 1330");
        assert_eq!(json["hr"], 72.0);
        assert!(json["rmssd"].is_null());
    }

    #[test]
    fn test_measurement_deserialization_normalizes_id() {
        let json = r#"{"session":"lab","device_mac":"ce-d6-ad-45-ed-75","device_name":"x",
            "timestamp":"t","hr":70,"lf_hf_ratio":null,"rmssd":40,"sdrr":null,"si":null}"#;
        let m: Measurement = serde_json::from_str(json).unwrap();
        assert_eq!(m.device_id.as_str(), "CE:D6:AD:45:ED:75");
        assert_eq!(m.session, Some(SessionId::Named("lab".to_string())));
        assert_eq!(m.metrics.hr, Some(70.0));
        assert_eq!(m.metrics.lf_hf_ratio, None);
    }

    #[test]
    fn test_measurement_deserialization_rejects_bad_id() {
        let json = r#"{"device_mac":"nope","device_name":"x","timestamp":"t"}"#;
        assert!(serde_json::from_str::<Measurement>(json).is_err());
    }

    #[test]
    fn test_metrics_is_empty() {
        assert!(Metrics::default().is_empty());
        assert!(
            !Metrics {
                sdrr: Some(0.0),
                ..Default::default()
            }
            .is_empty()
        );
    }
}

/// Property-based tests for address normalization.
#[cfg(test)]
mod proptests {
    use super::DeviceId;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn device_id_parse_never_panics(raw in ".{0,40}") {
            let _ = DeviceId::parse(&raw);
        }

        #[test]
        fn device_id_normalization_is_canonical(
            octets in proptest::array::uniform6(any::<u8>()),
            dashed in any::<bool>(),
            lower in any::<bool>(),
        ) {
            let sep = if dashed { "-" } else { ":" };
            let raw = octets
                .iter()
                .map(|o| if lower { format!("{:02x}", o) } else { format!("{:02X}", o) })
                .collect::<Vec<_>>()
                .join(sep);

            let id = DeviceId::parse(&raw).unwrap();
            prop_assert_eq!(id.as_str().len(), 17);
            prop_assert_eq!(DeviceId::parse(id.as_str()).unwrap(), id.clone());
            prop_assert_eq!(id.as_str(), id.as_str().to_ascii_uppercase());
        }
    }
}
