//! 内存态组件

pub mod result_cache;

pub use result_cache::InMemoryResultCache;
