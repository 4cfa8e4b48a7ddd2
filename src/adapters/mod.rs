// Adapters layer: concrete implementations of the domain ports (storage, http, mock backend).

pub mod http;
pub mod mock;
pub mod storage;

pub use http::HttpApi;
pub use mock::MockApi;
pub use storage::{LocalStorage, MemoryStorage};
