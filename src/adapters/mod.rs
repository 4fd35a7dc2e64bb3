pub mod http;
pub mod storage;

pub use http::HttpTransformer;
pub use storage::LocalStorage;
