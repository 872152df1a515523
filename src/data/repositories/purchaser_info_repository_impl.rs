use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    config::{OverlapPolicy, PurchaserInfoConfig},
    data::{
        date_normalizer,
        models::subscriber_response_model::{
            NonSubscriptionTransactionModel, PurchaseEntryModel, SubscriberModel,
            SubscriberResponseModel,
        },
    },
    domain::{
        entities::{
            expiration_date::ExpirationDate,
            purchaser_info::{PurchaserInfo, RetainedFields},
        },
        repositories::purchaser_info_repository::PurchaserInfoRepository,
    },
    errors::MalformedRecord,
};

/// Converts between raw subscriber records and `PurchaserInfo`.
#[derive(Debug, Clone, Default)]
pub struct PurchaserInfoRepositoryImpl {
    config: PurchaserInfoConfig,
}

impl PurchaserInfoRepositoryImpl {
    pub fn new(config: PurchaserInfoConfig) -> Self {
        Self { config }
    }
}

impl PurchaserInfoRepository for PurchaserInfoRepositoryImpl {
    fn parse(&self, raw: &Value) -> Result<PurchaserInfo, MalformedRecord> {
        let model = SubscriberResponseModel::deserialize(raw).map_err(|e| {
            MalformedRecord::with_debug("record does not have the subscriber structure", &e)
        })?;
        PurchaserInfo::from_subscriber_response_model(model, &self.config)
    }

    fn serialize(&self, purchaser_info: &PurchaserInfo) -> Value {
        purchaser_info.to_subscriber_response_model().into_value()
    }
}

#[derive(Clone, Copy, Debug)]
enum EntryKind {
    Subscription,
    Entitlement,
}

/// A subscription or entitlement entry with a usable purchase date.
struct ResolvedEntry {
    purchase_date: DateTime<Utc>,
    expiration: ExpirationDate,
    extra: Map<String, Value>,
}

impl PurchaserInfo {
    fn from_subscriber_response_model(
        m: SubscriberResponseModel,
        config: &PurchaserInfoConfig,
    ) -> Result<Self, MalformedRecord> {
        let SubscriberResponseModel {
            request_date: raw_request_date,
            subscriber,
            extra: top_level,
        } = m;
        let SubscriberModel {
            original_application_version: raw_original_application_version,
            subscriptions,
            non_subscriptions,
            entitlements,
            extra: subscriber_extra,
        } = subscriber;

        let overlapping: BTreeSet<String> = subscriptions
            .keys()
            .filter(|product_id| non_subscriptions.contains_key(*product_id))
            .cloned()
            .collect();
        if !overlapping.is_empty() {
            match config.overlapping_products {
                OverlapPolicy::Reject => {
                    return Err(MalformedRecord::new(format!(
                        "products listed as both subscription and non-subscription: {}",
                        overlapping.iter().cloned().collect::<Vec<_>>().join(", ")
                    )))
                }
                OverlapPolicy::PreferNonSubscription => warn!(
                    products = ?overlapping,
                    "Products listed as both subscription and non-subscription; keeping them as non-consumable."
                ),
            }
        }

        let mut retained = RetainedFields {
            top_level,
            subscriber: subscriber_extra,
            ..Default::default()
        };

        let request_date = match date_normalizer::normalize(raw_request_date.as_ref()) {
            Ok(date) => date,
            Err(e) => {
                warn!(field = "request_date", error = %e, "Ignoring malformed request date.");
                retained
                    .top_level
                    .insert("request_date".to_string(), raw_request_date.unwrap_or_default());
                None
            }
        };

        let original_application_version = match raw_original_application_version {
            None | Some(Value::Null) => None,
            Some(Value::String(version)) => Some(version),
            Some(other) => {
                warn!(
                    field = "original_application_version",
                    value = %other,
                    "Ignoring non-string original application version."
                );
                retained
                    .subscriber
                    .insert("original_application_version".to_string(), other);
                None
            }
        };

        let mut expiration_dates_by_product = BTreeMap::new();
        let mut purchase_dates_by_product = BTreeMap::new();
        for (product_id, raw_entry) in subscriptions {
            if overlapping.contains(&product_id) {
                retained
                    .unresolved_subscriptions
                    .insert(product_id, raw_entry);
                continue;
            }
            match resolve_entry(EntryKind::Subscription, &product_id, &raw_entry) {
                Some(entry) => {
                    purchase_dates_by_product.insert(product_id.clone(), entry.purchase_date);
                    expiration_dates_by_product.insert(product_id.clone(), entry.expiration);
                    retained.subscription_extras.insert(product_id, entry.extra);
                }
                None => {
                    retained
                        .unresolved_subscriptions
                        .insert(product_id, raw_entry);
                }
            }
        }

        let mut non_consumable_purchases = BTreeSet::new();
        for (product_id, transactions) in &non_subscriptions {
            non_consumable_purchases.insert(product_id.clone());
            if let Some(date) = latest_non_subscription_purchase(product_id, transactions) {
                purchase_dates_by_product.insert(product_id.clone(), date);
            }
        }
        retained.non_subscriptions = non_subscriptions;

        let mut expiration_date_by_entitlement = BTreeMap::new();
        let mut purchase_date_by_entitlement = BTreeMap::new();
        for (entitlement_id, raw_entry) in entitlements {
            match resolve_entry(EntryKind::Entitlement, &entitlement_id, &raw_entry) {
                Some(entry) => {
                    purchase_date_by_entitlement.insert(entitlement_id.clone(), entry.purchase_date);
                    expiration_date_by_entitlement.insert(entitlement_id.clone(), entry.expiration);
                    retained.entitlement_extras.insert(entitlement_id, entry.extra);
                }
                None => {
                    retained
                        .unresolved_entitlements
                        .insert(entitlement_id, raw_entry);
                }
            }
        }

        debug!(
            subscriptions = expiration_dates_by_product.len(),
            non_subscriptions = non_consumable_purchases.len(),
            entitlements = expiration_date_by_entitlement.len(),
            unresolved_subscriptions = retained.unresolved_subscriptions.len(),
            unresolved_entitlements = retained.unresolved_entitlements.len(),
            "Parsed purchaser record."
        );

        Ok(PurchaserInfo {
            expiration_dates_by_product,
            purchase_dates_by_product,
            expiration_date_by_entitlement,
            purchase_date_by_entitlement,
            non_consumable_purchases,
            original_application_version,
            request_date,
            retained,
        })
    }

    fn to_subscriber_response_model(&self) -> SubscriberResponseModel {
        let mut subscriptions = self.retained.unresolved_subscriptions.clone();
        for (product_id, expiration) in &self.expiration_dates_by_product {
            let Some(purchase_date) = self.purchase_dates_by_product.get(product_id) else {
                continue;
            };
            subscriptions.insert(
                product_id.clone(),
                entry_value(
                    purchase_date,
                    expiration,
                    self.retained.subscription_extras.get(product_id),
                ),
            );
        }

        let mut entitlements = self.retained.unresolved_entitlements.clone();
        for (entitlement_id, expiration) in &self.expiration_date_by_entitlement {
            let Some(purchase_date) = self.purchase_date_by_entitlement.get(entitlement_id) else {
                continue;
            };
            entitlements.insert(
                entitlement_id.clone(),
                entry_value(
                    purchase_date,
                    expiration,
                    self.retained.entitlement_extras.get(entitlement_id),
                ),
            );
        }

        SubscriberResponseModel {
            request_date: self
                .request_date
                .as_ref()
                .map(|date| Value::String(date_normalizer::format(date))),
            subscriber: SubscriberModel {
                original_application_version: self
                    .original_application_version
                    .clone()
                    .map(Value::String),
                subscriptions,
                non_subscriptions: self.retained.non_subscriptions.clone(),
                entitlements,
                extra: self.retained.subscriber.clone(),
            },
            extra: self.retained.top_level.clone(),
        }
    }
}

/// Reads one subscription or entitlement entry. Returns `None`, after logging,
/// when the entry has no usable purchase date; the caller keeps it verbatim.
fn resolve_entry(kind: EntryKind, id: &str, raw: &Value) -> Option<ResolvedEntry> {
    if !raw.is_object() {
        warn!(?kind, id, value = %raw, "Skipping entry that is not an object.");
        return None;
    }
    let model = match PurchaseEntryModel::deserialize(raw) {
        Ok(model) => model,
        Err(e) => {
            warn!(?kind, id, error = %e, "Skipping unreadable entry.");
            return None;
        }
    };
    let purchase_date = match date_normalizer::normalize(model.purchase_date.as_ref()) {
        Ok(Some(date)) => date,
        Ok(None) => {
            warn!(?kind, id, "Skipping entry without a purchase date.");
            return None;
        }
        Err(e) => {
            warn!(?kind, id, field = "purchase_date", error = %e, "Skipping entry with malformed purchase date.");
            return None;
        }
    };
    let expiration = match date_normalizer::normalize(model.expires_date.as_ref()) {
        Ok(Some(date)) => ExpirationDate::Expires(date),
        Ok(None) => ExpirationDate::NeverExpires,
        Err(e) => {
            warn!(?kind, id, field = "expires_date", error = %e, "Keeping malformed expiration date as unparsed.");
            ExpirationDate::Unparsed(model.expires_date.unwrap_or_default())
        }
    };
    Some(ResolvedEntry {
        purchase_date,
        expiration,
        extra: model.extra,
    })
}

/// Most recent readable purchase date in a `non_subscriptions` list.
fn latest_non_subscription_purchase(product_id: &str, transactions: &Value) -> Option<DateTime<Utc>> {
    let Some(transactions) = transactions.as_array() else {
        warn!(product_id, "Non-subscription purchases are not a list.");
        return None;
    };
    transactions
        .iter()
        .filter_map(|transaction| {
            let model = NonSubscriptionTransactionModel::deserialize(transaction).ok()?;
            match date_normalizer::normalize(model.purchase_date.as_ref()) {
                Ok(date) => date,
                Err(e) => {
                    warn!(product_id, field = "purchase_date", error = %e, "Ignoring malformed non-subscription purchase date.");
                    None
                }
            }
        })
        .max()
}

fn entry_value(
    purchase_date: &DateTime<Utc>,
    expiration: &ExpirationDate,
    extra: Option<&Map<String, Value>>,
) -> Value {
    let expires_date = match expiration {
        ExpirationDate::Expires(date) => Value::String(date_normalizer::format(date)),
        ExpirationDate::NeverExpires => Value::Null,
        ExpirationDate::Unparsed(raw) => raw.clone(),
    };
    PurchaseEntryModel {
        purchase_date: Some(Value::String(date_normalizer::format(purchase_date))),
        expires_date: Some(expires_date),
        extra: extra.cloned().unwrap_or_default(),
    }
    .into_value()
}
