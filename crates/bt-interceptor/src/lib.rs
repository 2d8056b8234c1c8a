//! Event interceptor: bounded capture of storage-engine mutations (spec §4.5).

pub mod config;
pub mod hooks;
pub mod interceptor;

pub use config::InterceptorConfig;
pub use hooks::StorageHooks;
pub use interceptor::{EventInterceptor, InterceptorStats};
