use crate::auth_http::AuthHttpDoer;
use crate::cache_entry::{CacheEntry, CachedResponse};
use crate::meta::extract_meta;
use crate::types::{Appliance, Device, FetchResult, GetAppliancesResult, GetDevicesResult};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

const DEVICES_PATH: &str = "/1/devices";
const APPLIANCES_PATH: &str = "/1/appliances";
const STATUS_OK: u16 = 200;

/// The upstream resources this client knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Devices,
    Appliances,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Devices => "devices",
            ResourceKind::Appliances => "appliances",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            ResourceKind::Devices => DEVICES_PATH,
            ResourceKind::Appliances => APPLIANCES_PATH,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("failed to decode {resource} response: {source}")]
    Decode {
        resource: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of the current instant, swappable so cache expiry can be tested
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Client for the Remo cloud API that caches successful responses per resource kind
pub struct RemoClient {
    auth_client: Arc<dyn AuthHttpDoer>,
    clock: Arc<dyn Clock>,
    base_url: String,
    cache_ttl: Duration,
    devices: Mutex<CacheEntry<Device>>,
    appliances: Mutex<CacheEntry<Appliance>>,
}

impl RemoClient {
    pub fn new(
        auth_client: Arc<dyn AuthHttpDoer>,
        base_url: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self::with_clock(auth_client, Arc::new(SystemClock), base_url, cache_ttl)
    }

    pub fn with_clock(
        auth_client: Arc<dyn AuthHttpDoer>,
        clock: Arc<dyn Clock>,
        base_url: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            auth_client,
            clock,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_ttl,
            devices: Mutex::new(CacheEntry::new()),
            appliances: Mutex::new(CacheEntry::new()),
        }
    }

    pub async fn get_devices(&self) -> Result<GetDevicesResult, FetchError> {
        self.fetch(ResourceKind::Devices, &self.devices).await
    }

    pub async fn get_appliances(&self) -> Result<GetAppliancesResult, FetchError> {
        self.fetch(ResourceKind::Appliances, &self.appliances).await
    }

    /// Serves `resource` from its cache entry or fetches it from upstream.
    ///
    /// The entry lock is held for the whole call so concurrent misses on the
    /// same resource kind result in a single upstream request.
    async fn fetch<T>(
        &self,
        resource: ResourceKind,
        entry: &Mutex<CacheEntry<T>>,
    ) -> Result<FetchResult<T>, FetchError>
    where
        T: DeserializeOwned + Clone,
    {
        let mut entry = entry.lock().await;
        let now = self.clock.now();

        if let Some(cached) = entry.get(now) {
            info!(
                "Returning cached {resource}. Cache valid for {} seconds",
                entry.remaining(now).as_secs()
            );
            return Ok(FetchResult {
                status_code: cached.status_code,
                meta: cached.meta,
                payload: cached.payload.clone(),
                from_cache: true,
            });
        }

        let url = format!("{}{}", self.base_url, resource.path());
        let response = self.auth_client.get(&url).await?;
        let meta = extract_meta(&response.headers);

        if response.status != STATUS_OK {
            warn!(
                "Request for {resource} returned status {}, keeping previous cache",
                response.status
            );
            return Ok(FetchResult {
                status_code: response.status,
                meta,
                payload: Vec::new(),
                from_cache: false,
            });
        }

        let payload: Vec<T> = serde_json::from_slice(&response.body)
            .map_err(|source| FetchError::Decode { resource, source })?;

        entry.store(
            CachedResponse {
                status_code: response.status,
                meta,
                payload: payload.clone(),
            },
            now,
            self.cache_ttl,
        );
        info!(
            "Fetched {resource} from the remote API. Caching for {} seconds",
            self.cache_ttl.as_secs()
        );

        Ok(FetchResult {
            status_code: response.status,
            meta,
            payload,
            from_cache: false,
        })
    }
}
