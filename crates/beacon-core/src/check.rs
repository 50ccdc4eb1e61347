//! Lookup of monitored checks referenced by alert jobs.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

use crate::{Error, Result};

/// Answers whether a check still exists upstream.
#[async_trait]
pub trait CheckLookup: Send + Sync {
    async fn exists(&self, code: Uuid) -> Result<bool>;
}

/// Fixed set of known check codes, for tests and local runs.
#[derive(Debug, Default)]
pub struct KnownChecks {
    codes: RwLock<HashSet<Uuid>>,
}

impl KnownChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes(codes: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            codes: RwLock::new(codes.into_iter().collect()),
        }
    }

    pub fn insert(&self, code: Uuid) -> Result<()> {
        self.codes
            .write()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?
            .insert(code);
        Ok(())
    }

}

#[async_trait]
impl CheckLookup for KnownChecks {
    async fn exists(&self, code: Uuid) -> Result<bool> {
        let codes = self
            .codes
            .read()
            .map_err(|_| Error::Internal("lock poisoned".to_string()))?;
        Ok(codes.contains(&code))
    }
}
