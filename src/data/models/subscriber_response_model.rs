use serde::Deserialize;
use serde_json::{Map, Value};

/// Top-level body of a subscriber response, as returned by the purchases
/// backend and as stored in the client cache.
///
/// Date fields are kept as raw JSON values here; they are normalized (and
/// malformed ones recovered from) when the model is converted into the domain
/// entity. Every struct keeps unrecognized fields in `extra` so that the
/// record can be written back without losing them.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscriberResponseModel {
    /// Server time at which the response was generated.
    #[serde(default)]
    pub(crate) request_date: Option<Value>,
    pub(crate) subscriber: SubscriberModel,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubscriberModel {
    /// Build of the app the customer first purchased with. Absent for
    /// customers who never purchased under a version-tracking scheme.
    #[serde(default)]
    pub(crate) original_application_version: Option<Value>,
    /// Product identifier -> `PurchaseEntryModel`. Required.
    pub(crate) subscriptions: Map<String, Value>,
    /// Product identifier -> list of one-time purchase transactions.
    #[serde(default)]
    pub(crate) non_subscriptions: Map<String, Value>,
    /// Entitlement identifier -> `PurchaseEntryModel`.
    #[serde(default)]
    pub(crate) entitlements: Map<String, Value>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

/// One entry under `subscriptions` or `entitlements`.
///
/// Entitlement entries usually also carry `product_identifier`, which is left
/// in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PurchaseEntryModel {
    #[serde(default)]
    pub(crate) purchase_date: Option<Value>,
    /// `null` and absent both mean the entry does not expire.
    #[serde(default)]
    pub(crate) expires_date: Option<Value>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

/// One transaction in a `non_subscriptions` list. Only the purchase date is
/// read; the list itself is kept verbatim.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NonSubscriptionTransactionModel {
    #[serde(default)]
    pub(crate) purchase_date: Option<Value>,
}

impl SubscriberResponseModel {
    /// Writes the model back as JSON. Fields that are `None` are omitted.
    pub(crate) fn into_value(self) -> Value {
        let mut object = self.extra;
        insert_present(&mut object, "request_date", self.request_date);
        object.insert("subscriber".to_string(), self.subscriber.into_value());
        Value::Object(object)
    }
}

impl SubscriberModel {
    pub(crate) fn into_value(self) -> Value {
        let mut object = self.extra;
        insert_present(
            &mut object,
            "original_application_version",
            self.original_application_version,
        );
        object.insert(
            "subscriptions".to_string(),
            Value::Object(self.subscriptions),
        );
        object.insert(
            "non_subscriptions".to_string(),
            Value::Object(self.non_subscriptions),
        );
        object.insert("entitlements".to_string(), Value::Object(self.entitlements));
        Value::Object(object)
    }
}

impl PurchaseEntryModel {
    /// Unlike the other models, a missing `expires_date` is written as `null`.
    pub(crate) fn into_value(self) -> Value {
        let mut object = self.extra;
        object.insert(
            "purchase_date".to_string(),
            self.purchase_date.unwrap_or(Value::Null),
        );
        object.insert(
            "expires_date".to_string(),
            self.expires_date.unwrap_or(Value::Null),
        );
        Value::Object(object)
    }
}

fn insert_present(object: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        object.insert(key.to_string(), value);
    }
}
