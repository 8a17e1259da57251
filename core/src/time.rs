//! Unix-millisecond timestamp codec.
//!
//! The API carries some instants as integer milliseconds since the epoch
//! instead of RFC 3339 strings. Domain types always hold `DateTime<Utc>`; the
//! millisecond form only exists at the serialization boundary.

use chrono::{DateTime, TimeZone, Utc};

/// Convert `t` to milliseconds since the Unix epoch, normalizing to UTC first.
///
/// Sub-millisecond precision is truncated toward the past.
pub fn to_milliseconds<Tz: TimeZone>(t: &DateTime<Tz>) -> i64 {
    t.with_timezone(&Utc).timestamp_millis()
}

/// Inverse of [`to_milliseconds`]. Returns `None` when `ms` falls outside the
/// range chrono can represent.
pub fn from_milliseconds(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// `#[serde(with = "millis")]` adapter for a required `DateTime<Utc>` field.
pub mod millis {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(super::to_milliseconds(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        super::from_milliseconds(ms)
            .ok_or_else(|| de::Error::custom(format!("timestamp {ms}ms is out of range")))
    }
}

/// `#[serde(with = "millis_option")]` adapter for an optional field. Pair it
/// with `skip_serializing_if = "Option::is_none"` to omit unset values.
pub mod millis_option {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        t: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match t {
            Some(t) => serializer.serialize_some(&super::to_milliseconds(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            Some(ms) => super::from_milliseconds(ms)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("timestamp {ms}ms is out of range"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, Timelike};
    use proptest::prelude::*;

    fn static_time() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2020, 1, 15)
            .unwrap()
            .and_hms_opt(23, 54, 17)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn to_milliseconds_known_instant() {
        assert_eq!(to_milliseconds(&static_time()), 1_579_132_457_000);
    }

    #[test]
    fn to_milliseconds_normalizes_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = static_time().with_timezone(&offset);
        assert_eq!(local.hour(), 1);
        assert_eq!(to_milliseconds(&local), 1_579_132_457_000);
    }

    #[test]
    fn to_milliseconds_truncates_sub_millisecond() {
        let t = static_time().with_nanosecond(123_456_789).unwrap();
        assert_eq!(to_milliseconds(&t), 1_579_132_457_123);
    }

    #[test]
    fn from_milliseconds_known_instant() {
        let t = from_milliseconds(1_554_130_937_000).unwrap();
        assert_eq!(t.timestamp(), 1_554_130_937);
        assert_eq!(t.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn from_milliseconds_epoch() {
        assert_eq!(from_milliseconds(0), Some(DateTime::UNIX_EPOCH));
    }

    #[test]
    fn from_milliseconds_out_of_range() {
        assert!(from_milliseconds(i64::MAX).is_none());
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Payload {
        #[serde(with = "millis")]
        at: DateTime<Utc>,
        #[serde(
            default,
            with = "millis_option",
            skip_serializing_if = "Option::is_none"
        )]
        until: Option<DateTime<Utc>>,
    }

    #[test]
    fn serde_adapters_write_integers() {
        let payload = Payload {
            at: static_time(),
            until: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"at":1579132457000}"#);

        let back: Payload = serde_json::from_str(r#"{"at":1579132457000,"until":0}"#).unwrap();
        assert_eq!(back.at, static_time());
        assert_eq!(back.until, Some(DateTime::UNIX_EPOCH));
    }

    #[test]
    fn serde_adapter_rejects_out_of_range() {
        let result: Result<Payload, _> =
            serde_json::from_str(&format!(r#"{{"at":{}}}"#, i64::MAX));
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn millisecond_round_trip(ms in 0i64..=253_402_300_799_999) {
            let t = from_milliseconds(ms).unwrap();
            prop_assert_eq!(to_milliseconds(&t), ms);
        }

        #[test]
        fn instant_round_trip_truncates(secs in 0i64..=253_402_300_799, nanos in 0u32..1_000_000_000) {
            let t = DateTime::from_timestamp(secs, nanos).unwrap();
            let truncated = t.with_nanosecond(nanos - nanos % 1_000_000).unwrap();
            prop_assert_eq!(from_milliseconds(to_milliseconds(&t)).unwrap(), truncated);
        }

        #[test]
        fn to_milliseconds_preserves_order(a in 0i64..=4_000_000_000_000, b in 0i64..=4_000_000_000_000) {
            let ta = from_milliseconds(a).unwrap();
            let tb = from_milliseconds(b).unwrap();
            prop_assert_eq!(ta.cmp(&tb), to_milliseconds(&ta).cmp(&to_milliseconds(&tb)));
        }
    }
}
