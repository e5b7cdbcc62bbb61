//! Wire types for inbound payment-provider notifications
//!
//! The provider posts an envelope `{type, event, object}` where
//! `object.metadata` is an opaque JSON mapping. Metadata is classified into
//! a tagged [`PaymentMetadata`] union exactly once at ingress; downstream
//! code matches on the enum and never re-inspects raw JSON.

use serde::{Deserialize, Deserializer, Serialize};
use shared::Error;
use std::fmt;
use std::str::FromStr;

/// Provider event names accepted by the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    PaymentSucceeded,
    PaymentCanceled,
    RefundSucceeded,
}

impl FromStr for PaymentEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment.succeeded" => Ok(Self::PaymentSucceeded),
            "payment.canceled" => Ok(Self::PaymentCanceled),
            "refund.succeeded" => Ok(Self::RefundSucceeded),
            other => Err(Error::validation(format!("Invalid event: {}", other))),
        }
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PaymentSucceeded => "payment.succeeded",
            Self::PaymentCanceled => "payment.canceled",
            Self::RefundSucceeded => "refund.succeeded",
        };
        f.write_str(s)
    }
}

/// Full notification envelope as posted by the provider
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub event: String,
    pub object: PaymentObject,
}

/// The payment (or refund) object inside the envelope
#[derive(Debug, Deserialize)]
pub struct PaymentObject {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    pub amount: Amount,
    /// Opaque until classified by [`PaymentMetadata::classify`]
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub cancellation_details: Option<CancellationDetails>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Amount {
    /// Coerce the monetary value to a number, rejecting unparseable input
    /// before any persistence happens.
    pub fn parse_value(&self) -> Result<f64, Error> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::validation(format!("Invalid amount: {:?}", self.value)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CancellationDetails {
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    #[serde(default)]
    pub id: String,
}

impl PaymentNotification {
    /// Validity predicate over the envelope shape.
    ///
    /// Requires `type == "notification"` and non-empty id, status and
    /// amount value. The metadata telegram id is checked during
    /// classification. Unknown events are rejected separately so the
    /// caller can answer "Invalid event" instead of a generic body error.
    pub fn validate_envelope(&self) -> Result<(), Error> {
        if self.notification_type != "notification" {
            return Err(Error::validation("Invalid request body"));
        }
        if self.object.id.is_empty()
            || self.object.status.is_empty()
            || self.object.amount.value.is_empty()
        {
            return Err(Error::validation("Invalid request body"));
        }
        Ok(())
    }
}

// ============================================================================
// Metadata classification
// ============================================================================

/// Tagged union over the two mutually-exclusive metadata payloads.
///
/// A package payload is distinguished by `packageName`, a subscription
/// payload by `subscriptionLevel`. Neither or both present is a malformed
/// event and is rejected at ingress.
#[derive(Debug, Clone)]
pub enum PaymentMetadata {
    Package(PackageMetadata),
    Subscription(SubscriptionMetadata),
}

impl PaymentMetadata {
    /// Classify opaque provider metadata into the tagged union.
    pub fn classify(metadata: &serde_json::Value) -> Result<Self, Error> {
        let has_package = metadata.get("packageName").is_some();
        let has_subscription = metadata.get("subscriptionLevel").is_some();

        match (has_package, has_subscription) {
            (true, false) => {
                let meta: PackageMetadata = serde_json::from_value(metadata.clone())
                    .map_err(|e| Error::validation(format!("Malformed package metadata: {}", e)))?;
                Ok(Self::Package(meta))
            }
            (false, true) => {
                let meta: SubscriptionMetadata =
                    serde_json::from_value(metadata.clone()).map_err(|e| {
                        Error::validation(format!("Malformed subscription metadata: {}", e))
                    })?;
                Ok(Self::Subscription(meta))
            }
            (true, true) => Err(Error::validation(
                "Malformed metadata: both packageName and subscriptionLevel present",
            )),
            (false, false) => Err(Error::validation(
                "Malformed metadata: neither packageName nor subscriptionLevel present",
            )),
        }
    }

    /// Telegram id common to both payload kinds
    pub fn telegram_id(&self) -> i64 {
        match self {
            Self::Package(m) => m.telegram_id,
            Self::Subscription(m) => m.telegram_id,
        }
    }
}

/// One-off package purchase payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(deserialize_with = "lenient_i64")]
    pub telegram_id: i64,
    pub package_name: String,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub basic_requests_balance: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub pro_requests_balance: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub image_generation_balance: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub tokens_number: Option<i64>,
}

/// Recurring subscription purchase payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMetadata {
    #[serde(deserialize_with = "lenient_i64")]
    pub telegram_id: i64,
    pub subscription_level: crate::models::billing::SubscriptionLevel,
    /// Serialized duration descriptor, parsed by the duration parser
    #[serde(default)]
    pub subscription_duration: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub basic_requests_per_day: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub pro_requests_per_day: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub image_generation_per_day: Option<i64>,
}

/// Providers serialize metadata values inconsistently: numbers arrive both
/// as JSON numbers and as strings. Accept either.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| DeError::custom("expected an integer")),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| DeError::custom(format!("expected an integer, got {:?}", s))),
        other => Err(DeError::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| DeError::custom("expected an integer")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| DeError::custom(format!("expected an integer, got {:?}", s))),
        Some(other) => Err(DeError::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_package_metadata() {
        let metadata = json!({
            "telegramId": 42,
            "packageName": "combo1",
            "basicRequestsBalance": 100,
            "proRequestsBalance": "25",
        });

        let classified = PaymentMetadata::classify(&metadata).unwrap();
        match classified {
            PaymentMetadata::Package(m) => {
                assert_eq!(m.telegram_id, 42);
                assert_eq!(m.package_name, "combo1");
                assert_eq!(m.basic_requests_balance, Some(100));
                assert_eq!(m.pro_requests_balance, Some(25));
                assert_eq!(m.tokens_number, None);
            }
            other => panic!("expected package metadata, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_token_package_with_string_ids() {
        let metadata = json!({
            "telegramId": "42",
            "packageName": "token1",
            "tokensNumber": "100",
        });

        let classified = PaymentMetadata::classify(&metadata).unwrap();
        match classified {
            PaymentMetadata::Package(m) => {
                assert_eq!(m.telegram_id, 42);
                assert_eq!(m.tokens_number, Some(100));
            }
            other => panic!("expected package metadata, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_subscription_metadata() {
        let metadata = json!({
            "telegramId": 7,
            "subscriptionLevel": "PRO",
            "subscriptionDuration": "{\"months\":1}",
            "basicRequestsPerDay": 50,
            "proRequestsPerDay": 10,
        });

        let classified = PaymentMetadata::classify(&metadata).unwrap();
        match classified {
            PaymentMetadata::Subscription(m) => {
                assert_eq!(m.telegram_id, 7);
                assert_eq!(m.basic_requests_per_day, 50);
                assert_eq!(m.pro_requests_per_day, Some(10));
                assert_eq!(m.image_generation_per_day, None);
            }
            other => panic!("expected subscription metadata, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_rejects_ambiguous_metadata() {
        let metadata = json!({
            "telegramId": 1,
            "packageName": "req1",
            "subscriptionLevel": "PRO",
        });
        assert!(PaymentMetadata::classify(&metadata).is_err());
    }

    #[test]
    fn test_classify_rejects_empty_metadata() {
        assert!(PaymentMetadata::classify(&json!({})).is_err());
    }

    #[test]
    fn test_classify_rejects_missing_telegram_id() {
        let metadata = json!({ "packageName": "req1" });
        assert!(PaymentMetadata::classify(&metadata).is_err());
    }

    #[test]
    fn test_event_parsing() {
        assert_eq!(
            "payment.succeeded".parse::<PaymentEvent>().unwrap(),
            PaymentEvent::PaymentSucceeded
        );
        assert_eq!(
            "refund.succeeded".parse::<PaymentEvent>().unwrap(),
            PaymentEvent::RefundSucceeded
        );
        assert!("payment.pending".parse::<PaymentEvent>().is_err());
    }

    #[test]
    fn test_amount_parsing() {
        let amount = Amount {
            value: "199.00".to_string(),
            currency: Some("RUB".to_string()),
        };
        assert_eq!(amount.parse_value().unwrap(), 199.0);

        let bad = Amount {
            value: "abc".to_string(),
            currency: None,
        };
        assert!(bad.parse_value().is_err());
    }

    #[test]
    fn test_envelope_validation() {
        let body = json!({
            "type": "notification",
            "event": "payment.succeeded",
            "object": {
                "id": "pay_1",
                "status": "succeeded",
                "amount": { "value": "199.00", "currency": "RUB" },
                "metadata": { "telegramId": 42, "packageName": "req1" }
            }
        });
        let parsed: PaymentNotification = serde_json::from_value(body).unwrap();
        assert!(parsed.validate_envelope().is_ok());
        assert_eq!(
            parsed.event.parse::<PaymentEvent>().unwrap(),
            PaymentEvent::PaymentSucceeded
        );
    }

    #[test]
    fn test_envelope_rejects_wrong_type() {
        let body = json!({
            "type": "ping",
            "event": "payment.succeeded",
            "object": {
                "id": "pay_1",
                "status": "succeeded",
                "amount": { "value": "199.00" },
                "metadata": {}
            }
        });
        let parsed: PaymentNotification = serde_json::from_value(body).unwrap();
        assert!(parsed.validate_envelope().is_err());
    }

    #[test]
    fn test_envelope_rejects_empty_id() {
        let body = json!({
            "type": "notification",
            "event": "payment.succeeded",
            "object": {
                "id": "",
                "status": "succeeded",
                "amount": { "value": "199.00" },
                "metadata": {}
            }
        });
        let parsed: PaymentNotification = serde_json::from_value(body).unwrap();
        assert!(parsed.validate_envelope().is_err());
    }
}
