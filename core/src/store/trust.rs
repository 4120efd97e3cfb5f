//! Trusted peer store
//!
//! Rows are created by pairing, refreshed by the transport, and deleted by
//! explicit unpair. Reads are served from an in-memory cache guarded by a
//! `std::sync::RwLock` so the TLS pinning validator can query trust from
//! the middle of a handshake without suspending; writes go through the
//! database first and then the cache.

use std::collections::HashMap;
use std::sync::RwLock;

use diesel::prelude::*;

use crate::store::db::DbPool;
use crate::store::models::DeviceRow;
use crate::store::schema::paired_devices::dsl as devices_dsl;
use crate::{Error, Result};

/// A trusted peer record.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub name: String,
    /// Base64 of the peer's SubjectPublicKeyInfo
    pub public_key: String,
    /// `SHA256:` + uppercase hex over the DER of the pinned TLS leaf
    pub certificate_fingerprint: String,
    pub last_seen: i64,
    pub is_trusted: bool,
    pub fallback_address: Option<String>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            public_key: row.public_key,
            certificate_fingerprint: row.certificate_fingerprint,
            last_seen: row.last_seen,
            is_trusted: row.is_trusted,
            fallback_address: row.fallback_address,
        }
    }
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            public_key: device.public_key.clone(),
            certificate_fingerprint: device.certificate_fingerprint.clone(),
            last_seen: device.last_seen,
            is_trusted: device.is_trusted,
            fallback_address: device.fallback_address.clone(),
        }
    }
}

/// Store of paired devices with a read-mostly in-memory cache.
pub struct TrustStore {
    pool: DbPool,
    cache: RwLock<HashMap<String, Device>>,
}

impl TrustStore {
    /// Open the store, hydrating the cache from the database.
    pub fn open(pool: DbPool) -> Result<Self> {
        let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;

        let rows: Vec<DeviceRow> = devices_dsl::paired_devices
            .load(&mut conn)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let cache = rows
            .into_iter()
            .map(Device::from)
            .map(|d| (d.id.clone(), d))
            .collect();

        Ok(Self {
            pool,
            cache: RwLock::new(cache),
        })
    }

    /// Insert a new device (upsert by id).
    pub async fn insert(&self, device: Device) -> Result<()> {
        self.upsert(device).await
    }

    /// Update an existing device (upsert by id).
    pub async fn update(&self, device: Device) -> Result<()> {
        self.upsert(device).await
    }

    async fn upsert(&self, device: Device) -> Result<()> {
        let pool = self.pool.clone();
        let row = DeviceRow::from(&device);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::insert_into(devices_dsl::paired_devices)
                .values(&row)
                .on_conflict(devices_dsl::id)
                .do_update()
                .set(&row)
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        self.cache
            .write()
            .expect("trust cache lock poisoned")
            .insert(device.id.clone(), device);
        Ok(())
    }

    /// Delete a device; the peer loses trust immediately.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let id_owned = id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::delete(devices_dsl::paired_devices.filter(devices_dsl::id.eq(&id_owned)))
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        self.cache
            .write()
            .expect("trust cache lock poisoned")
            .remove(id);
        Ok(())
    }

    /// Refresh a device's last-seen timestamp.
    pub async fn touch(&self, id: &str, ts: i64) -> Result<()> {
        let pool = self.pool.clone();
        let id_owned = id.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool.get().map_err(|e| Error::Storage(e.to_string()))?;
            diesel::update(devices_dsl::paired_devices.filter(devices_dsl::id.eq(&id_owned)))
                .set(devices_dsl::last_seen.eq(ts))
                .execute(&mut conn)
                .map_err(|e| Error::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Storage(e.to_string()))??;

        if let Some(device) = self
            .cache
            .write()
            .expect("trust cache lock poisoned")
            .get_mut(id)
        {
            device.last_seen = ts;
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Option<Device> {
        self.cache
            .read()
            .expect("trust cache lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn list(&self) -> Vec<Device> {
        self.cache
            .read()
            .expect("trust cache lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// All trusted devices. Synchronous and blocking-safe: callable from
    /// the middle of a TLS handshake.
    pub fn list_trusted(&self) -> Vec<Device> {
        self.cache
            .read()
            .expect("trust cache lock poisoned")
            .values()
            .filter(|d| d.is_trusted)
            .cloned()
            .collect()
    }

    /// Whether any trusted device pins the given certificate fingerprint.
    pub fn is_fingerprint_trusted(&self, fingerprint: &str) -> bool {
        self.cache
            .read()
            .expect("trust cache lock poisoned")
            .values()
            .any(|d| d.is_trusted && d.certificate_fingerprint == fingerprint)
    }
}
