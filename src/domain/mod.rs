//! Domain Layer - 领域层
//!
//! 纯业务逻辑，不依赖任何基础设施

pub mod assessment;
pub mod intent;
