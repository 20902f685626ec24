//! Key derivation and signing through the blocking bridge.

use std::sync::Arc;

use crate::native::CryptoApi;
use crate::runtime::{CancelSignal, WorkerContext};
use crate::types::{Error, Result};

#[derive(Clone)]
pub struct Crypto {
    api: Arc<dyn CryptoApi>,
    worker: WorkerContext,
}

impl Crypto {
    pub fn new(api: Arc<dyn CryptoApi>, worker: WorkerContext) -> Self {
        Self { api, worker }
    }

    pub async fn sign_data(
        &self,
        data: &[u8],
        private_key: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<u8>> {
        let api = self.api.clone();
        let data = data.to_vec();
        let key = private_key.to_string();
        self.worker
            .run_blocking("crypto.sign_data", move || api.sign_data(&data, &key), cancel)
            .await
    }

    /// Derive a private key (WIF) from a password and salt.
    pub async fn derive_private_key(
        &self,
        password: &str,
        salt: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<String> {
        if password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }
        let api = self.api.clone();
        let password = password.to_string();
        let salt = salt.to_string();
        self.worker
            .run_blocking(
                "crypto.derive_private_key",
                move || api.derive_private_key(&password, &salt),
                cancel,
            )
            .await
    }

    pub async fn derive_public_key(
        &self,
        private_key: &str,
        cancel: Option<&CancelSignal>,
    ) -> Result<String> {
        let api = self.api.clone();
        let key = private_key.to_string();
        self.worker
            .run_blocking("crypto.derive_public_key", move || api.derive_public_key(&key), cancel)
            .await
    }
}

impl std::fmt::Debug for Crypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypto").finish_non_exhaustive()
    }
}
