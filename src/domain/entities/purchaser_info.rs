use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    data::repositories::purchaser_info_repository_impl::PurchaserInfoRepositoryImpl,
    domain::repositories::purchaser_info_repository::PurchaserInfoRepository,
    errors::MalformedRecord,
};

use super::expiration_date::ExpirationDate;

/// Snapshot of a customer's purchases and entitlements.
///
/// Built once from a raw subscriber record and never modified; a fresher
/// record produces a new instance. Products (and entitlements) that have an
/// expiration entry always have a purchase date, and non-consumable purchases
/// never have an expiration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaserInfo {
    pub(crate) expiration_dates_by_product: BTreeMap<String, ExpirationDate>,
    pub(crate) purchase_dates_by_product: BTreeMap<String, DateTime<Utc>>,
    pub(crate) expiration_date_by_entitlement: BTreeMap<String, ExpirationDate>,
    pub(crate) purchase_date_by_entitlement: BTreeMap<String, DateTime<Utc>>,
    pub(crate) non_consumable_purchases: BTreeSet<String>,
    pub(crate) original_application_version: Option<String>,
    pub(crate) request_date: Option<DateTime<Utc>>,
    pub(crate) retained: RetainedFields,
}

/// Parts of the raw record that carry no lifecycle meaning but are written
/// back by the serializer.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RetainedFields {
    pub(crate) top_level: Map<String, Value>,
    pub(crate) subscriber: Map<String, Value>,
    /// Unknown fields of each resolved subscription entry.
    pub(crate) subscription_extras: BTreeMap<String, Map<String, Value>>,
    /// Unknown fields of each resolved entitlement entry.
    pub(crate) entitlement_extras: BTreeMap<String, Map<String, Value>>,
    /// Subscription entries that could not be resolved, verbatim.
    pub(crate) unresolved_subscriptions: Map<String, Value>,
    /// Entitlement entries that could not be resolved, verbatim.
    pub(crate) unresolved_entitlements: Map<String, Value>,
    /// `non_subscriptions` transaction lists, verbatim.
    pub(crate) non_subscriptions: Map<String, Value>,
}

impl PurchaserInfo {
    /// Parses a raw subscriber record with the default configuration.
    pub fn from_json(raw: &Value) -> Result<Self, MalformedRecord> {
        PurchaserInfoRepositoryImpl::default().parse(raw)
    }

    /// Writes the snapshot back in the wire shape it was parsed from.
    pub fn to_json_object(&self) -> Value {
        PurchaserInfoRepositoryImpl::default().serialize(self)
    }

    // Raw mappings.
    // ---------------------------------------------------------------------

    pub fn expiration_dates_by_product(&self) -> &BTreeMap<String, ExpirationDate> {
        &self.expiration_dates_by_product
    }

    pub fn purchase_dates_by_product(&self) -> &BTreeMap<String, DateTime<Utc>> {
        &self.purchase_dates_by_product
    }

    pub fn expiration_date_by_entitlement(&self) -> &BTreeMap<String, ExpirationDate> {
        &self.expiration_date_by_entitlement
    }

    pub fn purchase_date_by_entitlement(&self) -> &BTreeMap<String, DateTime<Utc>> {
        &self.purchase_date_by_entitlement
    }

    /// Products bought outright, with no expiration concept.
    pub fn non_consumable_purchases(&self) -> &BTreeSet<String> {
        &self.non_consumable_purchases
    }

    pub fn original_application_version(&self) -> Option<&str> {
        self.original_application_version.as_deref()
    }

    /// Server time at which the record was produced, if it said.
    pub fn request_date(&self) -> Option<DateTime<Utc>> {
        self.request_date
    }

    // Per-identifier lookups.
    // ---------------------------------------------------------------------

    pub fn expiration_date_for_product(&self, product_id: &str) -> Option<&ExpirationDate> {
        self.expiration_dates_by_product.get(product_id)
    }

    pub fn purchase_date_for_product(&self, product_id: &str) -> Option<DateTime<Utc>> {
        self.purchase_dates_by_product.get(product_id).copied()
    }

    pub fn expiration_date_for_entitlement(
        &self,
        entitlement_id: &str,
    ) -> Option<&ExpirationDate> {
        self.expiration_date_by_entitlement.get(entitlement_id)
    }

    pub fn purchase_date_for_entitlement(&self, entitlement_id: &str) -> Option<DateTime<Utc>> {
        self.purchase_date_by_entitlement.get(entitlement_id).copied()
    }

    /// The product currently backing an entitlement, as stated by the record.
    pub fn product_identifier_for_entitlement(&self, entitlement_id: &str) -> Option<&str> {
        self.retained
            .entitlement_extras
            .get(entitlement_id)?
            .get("product_identifier")?
            .as_str()
    }

    // Lifecycle.
    // ---------------------------------------------------------------------

    /// Whether the entitlement is active right now.
    pub fn is_active(&self, entitlement_id: &str) -> bool {
        self.is_active_at(entitlement_id, Utc::now())
    }

    /// Whether the entitlement is active at `at`, i.e. `at` falls within
    /// `[purchase_date, expiration_date)`, or after the purchase date when the
    /// entitlement does not expire.
    pub fn is_active_at(&self, entitlement_id: &str, at: DateTime<Utc>) -> bool {
        is_within_lifetime(
            self.purchase_date_by_entitlement.get(entitlement_id),
            self.expiration_date_by_entitlement.get(entitlement_id),
            at,
        )
    }

    /// Whether the product is active right now.
    pub fn is_product_active(&self, product_id: &str) -> bool {
        self.is_product_active_at(product_id, Utc::now())
    }

    /// Same rule as `is_active_at`, applied to products. Non-consumable
    /// purchases are always active.
    pub fn is_product_active_at(&self, product_id: &str, at: DateTime<Utc>) -> bool {
        self.non_consumable_purchases.contains(product_id)
            || is_within_lifetime(
                self.purchase_dates_by_product.get(product_id),
                self.expiration_dates_by_product.get(product_id),
                at,
            )
    }

    /// Identifiers of all entitlements active at `at`.
    pub fn active_entitlements(&self, at: DateTime<Utc>) -> BTreeSet<String> {
        self.expiration_date_by_entitlement
            .keys()
            .filter(|id| self.is_active_at(id, at))
            .cloned()
            .collect()
    }

    /// Subscription products active at `at`.
    pub fn active_subscriptions(&self, at: DateTime<Utc>) -> BTreeSet<String> {
        self.expiration_dates_by_product
            .keys()
            .filter(|id| self.is_product_active_at(id, at))
            .cloned()
            .collect()
    }

    /// Every product the customer has purchased, of any kind.
    pub fn all_purchased_product_identifiers(&self) -> BTreeSet<String> {
        self.purchase_dates_by_product
            .keys()
            .chain(self.expiration_dates_by_product.keys())
            .chain(self.non_consumable_purchases.iter())
            .cloned()
            .collect()
    }

    /// Furthest known product expiration date. Products that never expire or
    /// whose expiration could not be read are ignored.
    pub fn latest_expiration_date(&self) -> Option<DateTime<Utc>> {
        self.expiration_dates_by_product
            .values()
            .filter_map(ExpirationDate::date)
            .max()
    }
}

fn is_within_lifetime(
    purchase_date: Option<&DateTime<Utc>>,
    expiration_date: Option<&ExpirationDate>,
    at: DateTime<Utc>,
) -> bool {
    match (purchase_date, expiration_date) {
        (Some(purchased), Some(expiration)) => *purchased <= at && expiration.is_unexpired_at(at),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    fn sample() -> PurchaserInfo {
        PurchaserInfo::from_json(&json!({
            "subscriber": {
                "original_application_version": "1.0",
                "subscriptions": {
                    "monthly": {
                        "purchase_date": "2024-01-01T00:00:00Z",
                        "expires_date": "2024-02-01T00:00:00Z"
                    },
                    "yearly": {
                        "purchase_date": "2023-01-01T00:00:00Z",
                        "expires_date": "2024-01-01T00:00:00Z"
                    },
                    "forever_sub": {
                        "purchase_date": "2022-06-01T00:00:00Z",
                        "expires_date": null
                    }
                },
                "non_subscriptions": {
                    "lifetime_unlock": [
                        { "id": "abc", "purchase_date": "2021-05-01T00:00:00Z" }
                    ]
                },
                "entitlements": {
                    "pro": {
                        "purchase_date": "2024-01-01T00:00:00Z",
                        "expires_date": "2024-02-01T00:00:00Z",
                        "product_identifier": "monthly"
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn purchase_date_required_for_activity() {
        let info = sample();
        assert!(!info.is_active_at("pro", utc(2023, 12, 31)));
        assert!(info.is_active_at("pro", utc(2024, 1, 1)));
        assert!(!info.is_active_at("unknown", utc(2024, 1, 15)));
    }

    #[test]
    fn active_subscriptions_and_latest_expiration() {
        let info = sample();
        assert_eq!(
            info.active_subscriptions(utc(2024, 1, 15)),
            BTreeSet::from(["forever_sub".to_string(), "monthly".to_string()])
        );
        assert_eq!(info.latest_expiration_date(), Some(utc(2024, 2, 1)));
    }

    #[test]
    fn all_purchased_includes_non_consumables() {
        let info = sample();
        assert_eq!(
            info.all_purchased_product_identifiers(),
            BTreeSet::from([
                "forever_sub".to_string(),
                "lifetime_unlock".to_string(),
                "monthly".to_string(),
                "yearly".to_string(),
            ])
        );
        assert_eq!(
            info.purchase_date_for_product("lifetime_unlock"),
            Some(utc(2021, 5, 1))
        );
    }

    #[test]
    fn entitlement_product_identifier_is_exposed() {
        let info = sample();
        assert_eq!(info.product_identifier_for_entitlement("pro"), Some("monthly"));
        assert_eq!(info.product_identifier_for_entitlement("other"), None);
        assert_eq!(info.original_application_version(), Some("1.0"));
    }

    #[test]
    fn is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PurchaserInfo>();
    }
}
