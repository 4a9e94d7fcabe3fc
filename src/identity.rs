//! Who is logged in to Azure, cached in the settings document for a short while.
//!
//! Looking up the tenant takes two `az` round trips, which is noticeable when the
//! configuration menu redraws, so the answer is kept in the `azure_cache` entry of
//! the configuration for [`CACHE_TTL`].

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dependencies::{AccountReader, AzCliError},
    models::TenantInfo,
    settings::{self, IDENTITY_CACHE, SettingsStore},
};

pub const CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedIdentity {
    tenant_info: Option<TenantInfo>,
    timestamp: DateTime<Local>,
    #[serde(default)]
    cli_available: Option<bool>,
}

impl CachedIdentity {
    fn is_fresh(&self, now: DateTime<Local>) -> bool {
        now.signed_duration_since(self.timestamp)
            .to_std()
            .is_ok_and(|age| age < CACHE_TTL)
    }
}

pub struct Identity {
    reader: Box<dyn AccountReader + Send + Sync>,
    store: Arc<dyn SettingsStore>,
}

impl Identity {
    pub fn new(reader: Box<dyn AccountReader + Send + Sync>, store: Arc<dyn SettingsStore>) -> Self {
        Self { reader, store }
    }

    /// Whether `az account show` succeeds.
    pub async fn is_logged_in(&self) -> bool {
        match self.reader.show_account().await {
            Ok(_) => true,
            Err(err) => {
                debug!(%err, "not logged in");
                false
            }
        }
    }

    /// Tenant and subscription of the signed-in account; `None` when nobody is logged in.
    ///
    /// A cached answer younger than [`CACHE_TTL`] is returned without calling `az`.
    pub async fn current_tenant_info(&self) -> Result<Option<TenantInfo>> {
        let now = Local::now();
        let cached: Option<CachedIdentity> = self.store.load().configuration.get(IDENTITY_CACHE);
        if let Some(cached) = cached.filter(|c| c.is_fresh(now)) {
            debug!("using cached tenant info");
            return Ok(cached.tenant_info);
        }

        let (tenant_info, cli_available) = match self.lookup().await {
            Ok(info) => (Some(info), true),
            Err(AzCliError::NotInstalled) => (None, false),
            Err(err) => {
                debug!(%err, "tenant lookup failed");
                (None, true)
            }
        };

        let entry = CachedIdentity {
            tenant_info: tenant_info.clone(),
            timestamp: now,
            cli_available: Some(cli_available),
        };
        settings::update(self.store.as_ref(), |settings| {
            settings.configuration.set(IDENTITY_CACHE, &entry)
        })?;

        Ok(tenant_info)
    }

    async fn lookup(&self) -> Result<TenantInfo, AzCliError> {
        let account = self.reader.show_account().await?;
        let tenant = match self.reader.show_tenant(&account.tenant_id).await {
            Ok(tenant) => Some(tenant),
            Err(err) => {
                debug!(%err, tenant_id = %account.tenant_id, "tenant details unavailable");
                None
            }
        };
        Ok(TenantInfo::new(account, tenant))
    }

    /// Forget the cached identity, e.g. after a login.
    pub fn invalidate(&self) -> Result<()> {
        settings::update(self.store.as_ref(), |settings| {
            settings.configuration.remove(IDENTITY_CACHE)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dependencies::mocks::MockAzureCli,
        models::{Account, Tenant},
        settings::JsonSettingsStore,
    };
    use tempfile::tempdir;

    fn account() -> Account {
        Account {
            id: "sub-1".to_string(),
            name: "Production".to_string(),
            tenant_id: "tenant-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tenant_info_is_cached() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::in_dir(dir.path()));

        let mut reader = MockAzureCli::new();
        reader
            .expect_show_account()
            .times(1)
            .returning(|| Ok(account()));
        reader
            .expect_show_tenant()
            .withf(|tenant_id| tenant_id == "tenant-1")
            .times(1)
            .returning(|_| {
                Ok(Tenant {
                    display_name: Some("Contoso".to_string()),
                    default_domain: Some("contoso.onmicrosoft.com".to_string()),
                })
            });

        let identity = Identity::new(Box::new(reader), store.clone());

        let first = identity.current_tenant_info().await.unwrap().unwrap();
        assert_eq!(first.display_name, "Contoso");
        assert_eq!(first.subscription_name, "Production");

        // Second call is served from the settings document.
        let second = identity.current_tenant_info().await.unwrap();
        assert_eq!(second, Some(first));
        assert!(store.load().configuration.keys().any(|k| k == IDENTITY_CACHE));
    }

    #[tokio::test]
    async fn test_missing_tenant_details_fall_back_to_unknown() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::in_dir(dir.path()));

        let mut reader = MockAzureCli::new();
        reader.expect_show_account().returning(|| Ok(account()));
        reader
            .expect_show_tenant()
            .returning(|_| Err(AzCliError::CommandFailed("forbidden".to_string())));

        let identity = Identity::new(Box::new(reader), store);
        let info = identity.current_tenant_info().await.unwrap().unwrap();
        assert_eq!(info.display_name, "Unknown");
        assert_eq!(info.tenant_id, "tenant-1");
    }

    #[tokio::test]
    async fn test_not_logged_in_and_invalidate() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn SettingsStore> = Arc::new(JsonSettingsStore::in_dir(dir.path()));

        let mut reader = MockAzureCli::new();
        reader
            .expect_show_account()
            .times(3)
            .returning(|| Err(AzCliError::CommandFailed("Please run 'az login'".to_string())));

        let identity = Identity::new(Box::new(reader), store.clone());
        assert!(!identity.is_logged_in().await);
        assert_eq!(identity.current_tenant_info().await.unwrap(), None);

        // The negative answer is cached too, until invalidated.
        assert_eq!(identity.current_tenant_info().await.unwrap(), None);
        identity.invalidate().unwrap();
        assert!(!store.load().configuration.keys().any(|k| k == IDENTITY_CACHE));
        assert_eq!(identity.current_tenant_info().await.unwrap(), None);
    }
}
