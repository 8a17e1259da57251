//! Subscriber resource types as returned by the API.
//!
//! RFC 3339 timestamps decode into `DateTime<Utc>`. Missing fields fall back
//! to their defaults so partial subscriber objects still decode.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::time::{from_milliseconds, to_milliseconds};

/// One end user's purchases, entitlements and attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscriber {
    pub original_app_user_id: String,
    pub original_application_version: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub entitlements: HashMap<String, Entitlement>,
    pub subscriptions: HashMap<String, Subscription>,
    pub non_subscriptions: HashMap<String, Vec<NonSubscription>>,
    pub subscriber_attributes: HashMap<String, SubscriberAttribute>,
}

impl Subscriber {
    /// Whether the named entitlement is active right now.
    pub fn is_entitled_to(&self, entitlement: &str) -> bool {
        self.is_entitled_to_at(entitlement, Utc::now())
    }

    /// Whether the named entitlement is active at `now`. An entitlement
    /// without an expiry never lapses.
    pub fn is_entitled_to_at(&self, entitlement: &str, now: DateTime<Utc>) -> bool {
        match self.entitlements.get(entitlement) {
            Some(e) => e.expires_date.map_or(true, |expires| expires >= now),
            None => false,
        }
    }
}

/// Wire shape of every subscriber-returning endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SubscriberEnvelope {
    #[serde(default)]
    pub subscriber: Subscriber,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entitlement {
    pub expires_date: Option<DateTime<Utc>>,
    pub grace_period_expires_date: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
    pub product_identifier: String,
    pub product_plan_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub expires_date: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
    pub original_purchase_date: DateTime<Utc>,
    pub period_type: PeriodType,
    pub store: Store,
    pub is_sandbox: bool,
    pub unsubscribe_detected_at: Option<DateTime<Utc>>,
    pub billing_issues_detected_at: Option<DateTime<Utc>>,
    pub auto_resume_date: Option<DateTime<Utc>>,
    pub grace_period_expires_date: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub ownership_type: OwnershipType,
    pub store_transaction_id: String,
    pub product_plan_identifier: Option<String>,
}

/// A one-off purchase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonSubscription {
    pub id: String,
    pub purchase_date: DateTime<Utc>,
    pub store: Store,
    pub is_sandbox: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    #[default]
    Normal,
    Trial,
    Intro,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    #[default]
    Purchased,
    FamilyShared,
}

/// Store a purchase was made in. Doubles as a platform tag for the
/// `X-Platform` header (see [`Store::as_str`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Store {
    #[default]
    AppStore,
    MacAppStore,
    PlayStore,
    Stripe,
    Promotional,
    Other(String),
}

impl Store {
    pub fn as_str(&self) -> &str {
        match self {
            Store::AppStore => "app_store",
            Store::MacAppStore => "mac_app_store",
            Store::PlayStore => "play_store",
            Store::Stripe => "stripe",
            Store::Promotional => "promotional",
            Store::Other(other) => other,
        }
    }
}

impl From<&str> for Store {
    fn from(value: &str) -> Self {
        match value {
            "app_store" => Store::AppStore,
            "mac_app_store" => Store::MacAppStore,
            "play_store" => Store::PlayStore,
            "stripe" => Store::Stripe,
            "promotional" => Store::Promotional,
            other => Store::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Store {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Store::from(raw.as_str()))
    }
}

/// A custom key/value attribute attached to a subscriber.
///
/// On the wire the update time travels as `updated_at_ms`, and only when it
/// is set to a non-zero instant. An unset time and the epoch both decode to
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberAttribute {
    pub value: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SubscriberAttribute {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            updated_at: None,
        }
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }
}

#[derive(Serialize)]
struct AttributeOut<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at_ms: Option<i64>,
}

#[derive(Deserialize)]
struct AttributeIn {
    #[serde(default)]
    value: String,
    #[serde(default)]
    updated_at_ms: Option<i64>,
}

impl Serialize for SubscriberAttribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let updated_at_ms = self
            .updated_at
            .as_ref()
            .map(to_milliseconds)
            .filter(|ms| *ms != 0);
        AttributeOut {
            value: &self.value,
            updated_at_ms,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SubscriberAttribute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = AttributeIn::deserialize(deserializer)?;
        let updated_at = match wire.updated_at_ms {
            Some(ms) if ms > 0 => Some(from_milliseconds(ms).ok_or_else(|| {
                serde::de::Error::custom(format!("updated_at_ms {ms} is out of range"))
            })?),
            _ => None,
        };
        Ok(SubscriberAttribute {
            value: wire.value,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn at_ms(ms: i64) -> DateTime<Utc> {
        from_milliseconds(ms).unwrap()
    }

    #[test]
    fn attribute_encodes_timestamp_in_millis() {
        let attr = SubscriberAttribute::new("foo").updated_at(at_ms(1_554_130_937_000));
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"value":"foo","updated_at_ms":1554130937000}"#);
    }

    #[test]
    fn attribute_omits_unset_timestamp() {
        let json = serde_json::to_string(&SubscriberAttribute::new("bar")).unwrap();
        assert_eq!(json, r#"{"value":"bar"}"#);
    }

    #[test]
    fn attribute_omits_epoch_timestamp() {
        let attr = SubscriberAttribute::new("bar").updated_at(DateTime::UNIX_EPOCH);
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"value":"bar"}"#);
    }

    #[test]
    fn attribute_decodes_timestamp() {
        let attr: SubscriberAttribute =
            serde_json::from_str(r#"{"value":"foo","updated_at_ms":1554130937000}"#).unwrap();
        assert_eq!(
            attr,
            SubscriberAttribute::new("foo").updated_at(at_ms(1_554_130_937_000))
        );
    }

    #[test]
    fn attribute_zero_and_absent_decode_the_same() {
        let zero: SubscriberAttribute =
            serde_json::from_str(r#"{"value":"foo","updated_at_ms":0}"#).unwrap();
        let absent: SubscriberAttribute = serde_json::from_str(r#"{"value":"foo"}"#).unwrap();
        let null: SubscriberAttribute =
            serde_json::from_str(r#"{"value":"foo","updated_at_ms":null}"#).unwrap();
        assert_eq!(zero, absent);
        assert_eq!(null, absent);
        assert_eq!(absent.updated_at, None);
    }

    #[test]
    fn attribute_ignores_negative_timestamp() {
        let attr: SubscriberAttribute =
            serde_json::from_str(r#"{"value":"foo","updated_at_ms":-5}"#).unwrap();
        assert_eq!(attr.updated_at, None);
    }

    #[test]
    fn attribute_rejects_wrong_type() {
        let result = serde_json::from_str::<SubscriberAttribute>(r#"{"value":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn store_round_trips_unknown_values() {
        let store: Store = serde_json::from_str(r#""amazon""#).unwrap();
        assert_eq!(store, Store::Other("amazon".to_string()));
        assert_eq!(serde_json::to_string(&store).unwrap(), r#""amazon""#);
        let store: Store = serde_json::from_str(r#""play_store""#).unwrap();
        assert_eq!(store, Store::PlayStore);
    }

    #[test]
    fn subscriber_decodes_api_shape() {
        let raw = r#"{
            "original_app_user_id": "123",
            "original_application_version": null,
            "first_seen": "2020-01-15T23:54:17Z",
            "last_seen": "2020-01-16T10:00:00Z",
            "entitlements": {
                "pro": {
                    "expires_date": "2030-01-01T00:00:00Z",
                    "grace_period_expires_date": null,
                    "purchase_date": "2020-01-15T23:54:17Z",
                    "product_identifier": "monthly"
                },
                "lifetime": {
                    "expires_date": null,
                    "purchase_date": "2020-01-15T23:54:17Z",
                    "product_identifier": "forever"
                }
            },
            "subscriptions": {
                "monthly": {
                    "expires_date": "2030-01-01T00:00:00Z",
                    "purchase_date": "2020-01-15T23:54:17Z",
                    "original_purchase_date": "2020-01-15T23:54:17Z",
                    "period_type": "trial",
                    "store": "app_store",
                    "is_sandbox": true,
                    "ownership_type": "FAMILY_SHARED",
                    "store_transaction_id": "1000000"
                }
            },
            "non_subscriptions": {
                "coins": [{"id": "abc", "purchase_date": "2020-01-15T23:54:17Z", "store": "play_store", "is_sandbox": false}]
            },
            "subscriber_attributes": {
                "$email": {"value": "a@example.com", "updated_at_ms": 1579132457000}
            }
        }"#;
        let sub: Subscriber = serde_json::from_str(raw).unwrap();
        assert_eq!(sub.original_app_user_id, "123");
        assert!(sub.original_application_version.is_none());
        assert_eq!(sub.entitlements["pro"].product_identifier, "monthly");
        assert!(sub.entitlements["lifetime"].expires_date.is_none());

        let monthly = &sub.subscriptions["monthly"];
        assert_eq!(monthly.period_type, PeriodType::Trial);
        assert_eq!(monthly.store, Store::AppStore);
        assert_eq!(monthly.ownership_type, OwnershipType::FamilyShared);
        assert!(monthly.is_sandbox);
        assert!(monthly.refunded_at.is_none());

        assert_eq!(sub.non_subscriptions["coins"][0].store, Store::PlayStore);
        assert_eq!(
            sub.subscriber_attributes["$email"].updated_at,
            Some(at_ms(1_579_132_457_000))
        );
    }

    #[test]
    fn empty_subscriber_decodes_to_default() {
        let sub: Subscriber = serde_json::from_str("{}").unwrap();
        assert_eq!(sub, Subscriber::default());
    }

    #[test]
    fn is_entitled_to_cases() {
        let now = at_ms(1_600_000_000_000);
        let entitlement = |expires: Option<DateTime<Utc>>| Entitlement {
            expires_date: expires,
            ..Entitlement::default()
        };

        let empty = Subscriber::default();
        assert!(!empty.is_entitled_to_at("test", now));

        let mut sub = Subscriber::default();
        sub.entitlements.insert("foo".to_string(), entitlement(None));
        assert!(!sub.is_entitled_to_at("test", now), "missing");

        sub.entitlements
            .insert("test".to_string(), entitlement(Some(now - Duration::hours(1))));
        assert!(!sub.is_entitled_to_at("test", now), "expired");

        sub.entitlements
            .insert("test".to_string(), entitlement(Some(now + Duration::hours(1))));
        assert!(sub.is_entitled_to_at("test", now), "subscribed");

        sub.entitlements.insert("test".to_string(), entitlement(None));
        assert!(sub.is_entitled_to_at("test", now), "lifetime");
    }

    proptest! {
        #[test]
        fn attribute_round_trip(value in ".*", ms in proptest::option::of(1i64..=253_402_300_799_999)) {
            let attr = SubscriberAttribute {
                value,
                updated_at: ms.map(at_ms),
            };
            let json = serde_json::to_string(&attr).unwrap();
            let back: SubscriberAttribute = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, attr);
        }
    }
}
