pub mod store;

pub use store::StoreClient;
