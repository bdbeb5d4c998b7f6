use std::sync::{PoisonError, RwLock};

/// 凭证存储
pub trait CredentialStore: Send + Sync {
    /// 当前 API key；未配置时返回 `None`
    fn credential(&self) -> Option<String>;
}

/// 内存中的凭证，可在运行期间更新
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    api_key: RwLock<Option<String>>,
}

impl StaticCredentialStore {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: RwLock::new(api_key),
        }
    }

    pub fn set(&self, api_key: Option<String>) {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = api_key;
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credential(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|key| !key.trim().is_empty())
    }
}
