//! 外部系统适配器

pub mod engine;
pub mod storage;
