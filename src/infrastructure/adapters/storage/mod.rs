//! 文件存储适配器

pub mod temp_asset_store;

pub use temp_asset_store::TempAssetStore;
