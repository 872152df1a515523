use serde_json::Value;

use crate::{
    config::PurchaserInfoConfig,
    data::repositories::purchaser_info_repository_impl::PurchaserInfoRepositoryImpl,
    domain::{
        entities::purchaser_info::PurchaserInfo,
        repositories::purchaser_info_repository::PurchaserInfoRepository,
    },
    errors::MalformedRecord,
};

pub struct PurchaserInfoUtil<R: PurchaserInfoRepository> {
    purchaser_info_repository: R,
}

impl<R: PurchaserInfoRepository> PurchaserInfoUtil<R> {
    pub fn parse(&self, raw: &Value) -> Result<PurchaserInfo, MalformedRecord> {
        self.purchaser_info_repository.parse(raw)
    }

    /// Same as `parse`, for a record still in JSON text form (e.g. read back
    /// from a cache).
    pub fn parse_str(&self, raw: &str) -> Result<PurchaserInfo, MalformedRecord> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| MalformedRecord::with_debug("record is not valid JSON", &e))?;
        self.parse(&value)
    }

    pub fn serialize(&self, purchaser_info: &PurchaserInfo) -> Value {
        self.purchaser_info_repository.serialize(purchaser_info)
    }
}

impl PurchaserInfoUtil<PurchaserInfoRepositoryImpl> {
    pub fn new(config: PurchaserInfoConfig) -> Self {
        Self {
            purchaser_info_repository: PurchaserInfoRepositoryImpl::new(config),
        }
    }
}

impl Default for PurchaserInfoUtil<PurchaserInfoRepositoryImpl> {
    fn default() -> Self {
        Self::new(PurchaserInfoConfig::default())
    }
}
