use serde_json::Value;

use crate::{domain::entities::purchaser_info::PurchaserInfo, errors::MalformedRecord};

pub trait PurchaserInfoRepository {
    /// Builds a `PurchaserInfo` from a raw subscriber record.
    ///
    /// Malformed individual fields are recovered from; only a record missing
    /// its container structure (or contradicting itself) is rejected.
    fn parse(&self, raw: &Value) -> Result<PurchaserInfo, MalformedRecord>;

    /// Writes a `PurchaserInfo` back in the raw record shape, such that
    /// parsing the output yields an equal `PurchaserInfo`.
    fn serialize(&self, purchaser_info: &PurchaserInfo) -> Value;
}
