pub(crate) mod data {
    pub(crate) mod date_normalizer;
    pub(crate) mod models {
        pub(crate) mod subscriber_response_model;
    }
    pub(crate) mod repositories {
        pub(crate) mod purchaser_info_repository_impl;
    }
}

pub mod domain {
    pub mod entities {
        pub mod expiration_date;
        pub mod purchaser_info;
    }
    pub mod repositories {
        pub mod purchaser_info_repository;
    }
}

pub mod config;
pub mod errors;
pub mod util;

pub use data::repositories::purchaser_info_repository_impl::PurchaserInfoRepositoryImpl;
