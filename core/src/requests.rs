//! Request payloads for the resource endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::time::{millis, millis_option};
use crate::types::SubscriberAttribute;

/// Length of a promotional entitlement grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementDuration {
    Daily,
    Weekly,
    Monthly,
    TwoMonth,
    ThreeMonth,
    SixMonth,
    Yearly,
    Lifetime,
}

/// Attribution network, sent as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    AppleSearchAds = 0,
    Adjust = 1,
    AppsFlyer = 2,
    Branch = 3,
    Tenjin = 4,
    Facebook = 5,
}

impl Network {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Device advertising identifiers for attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributionData {
    #[serde(rename = "rc_idfa", skip_serializing_if = "Option::is_none")]
    pub idfa: Option<String>,
    #[serde(rename = "rc_gps_adid", skip_serializing_if = "Option::is_none")]
    pub play_services_id: Option<String>,
}

/// Optional fields for recording a purchase. Unset fields are left out of
/// the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreatePurchaseOptions {
    /// Sent as the `X-Platform` header, never in the body.
    #[serde(skip)]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introductory_price: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_restore: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, SubscriberAttribute>,
}

impl CreatePurchaseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn price(mut self, price: f64, currency: impl Into<String>) -> Self {
        self.price = Some(price);
        self.currency = Some(currency.into());
        self
    }

    pub fn payment_mode(mut self, payment_mode: impl Into<String>) -> Self {
        self.payment_mode = Some(payment_mode.into());
        self
    }

    pub fn introductory_price(mut self, price: f64) -> Self {
        self.introductory_price = Some(price);
        self
    }

    pub fn restore(mut self, is_restore: bool) -> Self {
        self.is_restore = is_restore;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, attribute: SubscriberAttribute) -> Self {
        self.attributes.insert(key.into(), attribute);
        self
    }
}

#[derive(Serialize)]
pub(crate) struct CreatePurchaseBody<'a> {
    pub app_user_id: &'a str,
    pub fetch_token: &'a str,
    #[serde(flatten)]
    pub options: Option<&'a CreatePurchaseOptions>,
}

#[derive(Serialize)]
pub(crate) struct AttributesBody<'a> {
    pub attributes: &'a BTreeMap<String, SubscriberAttribute>,
}

#[derive(Serialize)]
pub(crate) struct AttributionBody<'a> {
    pub data: &'a AttributionData,
    pub network: Network,
}

#[derive(Serialize)]
pub(crate) struct GrantEntitlementBody {
    pub duration: EntitlementDuration,
    #[serde(
        rename = "start_time_ms",
        with = "millis_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub(crate) struct DeferSubscriptionBody {
    #[serde(rename = "expiry_time_ms", with = "millis")]
    pub expiry_time: DateTime<Utc>,
}
