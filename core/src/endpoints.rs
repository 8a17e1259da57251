//! Resource operations. Each one is a path template and payload over
//! [`Client::call`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::client::{Client, Json, NO_BODY};
use crate::error::Result;
use crate::http::{HttpExecutor, HttpMethod};
use crate::requests::{
    AttributesBody, AttributionBody, AttributionData, CreatePurchaseBody, CreatePurchaseOptions,
    DeferSubscriptionBody, EntitlementDuration, GrantEntitlementBody, Network,
};
use crate::types::{Subscriber, SubscriberAttribute, SubscriberEnvelope};

impl<E: HttpExecutor> Client<E> {
    /// Fetch a subscriber, creating it if it does not exist yet.
    pub fn get_subscriber(&self, user_id: &str) -> Result<Subscriber> {
        self.get_subscriber_with_platform(user_id, "")
    }

    /// Like [`Client::get_subscriber`], also updating `last_seen` for
    /// `platform`.
    pub fn get_subscriber_with_platform(&self, user_id: &str, platform: &str) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}");
        self.subscriber_call(HttpMethod::Get, &path, NO_BODY, Some(platform))
    }

    pub fn update_subscriber_attributes(
        &self,
        user_id: &str,
        attributes: &BTreeMap<String, SubscriberAttribute>,
    ) -> Result<()> {
        let path = format!("subscribers/{user_id}/attributes");
        self.call(HttpMethod::Post, &path, Some(&AttributesBody { attributes }), None)
    }

    /// Permanently delete a subscriber.
    pub fn delete_subscriber(&self, user_id: &str) -> Result<()> {
        let path = format!("subscribers/{user_id}");
        self.call(HttpMethod::Delete, &path, NO_BODY, None)
    }

    /// Record a store receipt for `user_id`, creating the user if needed.
    pub fn create_purchase(
        &self,
        user_id: &str,
        receipt: &str,
        options: Option<&CreatePurchaseOptions>,
    ) -> Result<Subscriber> {
        let body = CreatePurchaseBody {
            app_user_id: user_id,
            fetch_token: receipt,
            options,
        };
        let platform = options.and_then(|o| o.platform.as_deref());
        self.subscriber_call(HttpMethod::Post, "receipts", Some(&body), platform)
    }

    pub fn add_user_attribution(
        &self,
        user_id: &str,
        network: Network,
        data: &AttributionData,
    ) -> Result<()> {
        let path = format!("subscribers/{user_id}/attribution");
        self.call(HttpMethod::Post, &path, Some(&AttributionBody { data, network }), None)
    }

    /// Grant a promotional entitlement. Without `start_time` the grant
    /// starts now on the server.
    pub fn grant_entitlement(
        &self,
        user_id: &str,
        entitlement_id: &str,
        duration: EntitlementDuration,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/entitlements/{entitlement_id}/promotional");
        let body = GrantEntitlementBody {
            duration,
            start_time,
        };
        self.subscriber_call(HttpMethod::Post, &path, Some(&body), None)
    }

    /// Revoke every promotional grant of `entitlement_id`.
    pub fn revoke_entitlement(&self, user_id: &str, entitlement_id: &str) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/entitlements/{entitlement_id}/revoke_promotionals");
        self.subscriber_call(HttpMethod::Post, &path, NO_BODY, None)
    }

    pub fn override_offering(&self, user_id: &str, offering_uuid: &str) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/offerings/{offering_uuid}/override");
        self.subscriber_call(HttpMethod::Post, &path, NO_BODY, None)
    }

    /// Reset the offering back to the project's current one.
    pub fn delete_offering_override(&self, user_id: &str) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/offerings/override");
        self.subscriber_call(HttpMethod::Delete, &path, NO_BODY, None)
    }

    /// Revoke access to a Play Store subscription and refund its last
    /// purchase.
    pub fn refund_google_subscription(&self, user_id: &str, product_id: &str) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/subscriptions/{product_id}/revoke");
        self.subscriber_call(HttpMethod::Post, &path, NO_BODY, None)
    }

    /// Push the next renewal of a Play Store subscription to `next_expiry`.
    pub fn defer_google_subscription(
        &self,
        user_id: &str,
        product_id: &str,
        next_expiry: DateTime<Utc>,
    ) -> Result<Subscriber> {
        let path = format!("subscribers/{user_id}/subscriptions/{product_id}/defer");
        let body = DeferSubscriptionBody {
            expiry_time: next_expiry,
        };
        self.subscriber_call(HttpMethod::Post, &path, Some(&body), None)
    }

    fn subscriber_call<B: serde::Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        platform: Option<&str>,
    ) -> Result<Subscriber> {
        let Json(envelope): Json<SubscriberEnvelope> = self.call(method, path, body, platform)?;
        Ok(envelope.subscriber)
    }
}
