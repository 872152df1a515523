use serde::Deserialize;

/// What to do with a product listed under both `subscriptions` and
/// `non_subscriptions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fail the whole parse with `MalformedRecord`.
    #[default]
    Reject,
    /// Keep the product as a non-consumable; the subscription entry is kept
    /// only for re-serialization.
    PreferNonSubscription,
}

/// Parse policy for purchaser records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PurchaserInfoConfig {
    pub overlapping_products: OverlapPolicy,
}
