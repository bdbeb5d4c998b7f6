//! 基础设施层
//!
//! 持有稀缺资源（出站调用队列）与外部协作方接口，只暴露能力

pub mod api_gate;
pub mod credential_store;
pub mod image_store;

pub use api_gate::ApiGate;
pub use credential_store::{CredentialStore, StaticCredentialStore};
pub use image_store::{ImageStore, MemoryImageStore};
