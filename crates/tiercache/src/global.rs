//! Process-wide cache manager
//!
//! The shared manager is built lazily with default settings on first use.
//! [`init_cache`] replaces it outright; handles obtained earlier keep
//! pointing at the previous instance until they are dropped.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::{config::CacheSettings, error::CacheResult, manager::CacheManager};

static CACHE_MANAGER: Lazy<RwLock<Option<Arc<CacheManager>>>> = Lazy::new(|| RwLock::new(None));

/// Get the shared cache manager, building it with default settings if needed
///
/// # Errors
///
/// Returns error if the default file cache directory cannot be created
pub fn get_cache_manager() -> CacheResult<Arc<CacheManager>> {
    if let Some(manager) = CACHE_MANAGER.read().as_ref() {
        return Ok(Arc::clone(manager));
    }

    let mut slot = CACHE_MANAGER.write();
    if let Some(manager) = slot.as_ref() {
        return Ok(Arc::clone(manager));
    }

    let manager = Arc::new(CacheManager::new(CacheSettings::default())?);
    info!("Initialized cache manager with default settings");
    *slot = Some(Arc::clone(&manager));
    Ok(manager)
}

/// Replace the shared cache manager with one built from `settings`
///
/// # Errors
///
/// Returns error if the settings are invalid; the previous manager stays in
/// place in that case
pub fn init_cache(settings: CacheSettings) -> CacheResult<Arc<CacheManager>> {
    let manager = Arc::new(CacheManager::new(settings)?);
    *CACHE_MANAGER.write() = Some(Arc::clone(&manager));
    info!(
        "Initialized cache manager (file cache at {})",
        manager.settings().file_cache_dir.display()
    );
    Ok(manager)
}

/// Drop the shared cache manager; the next access rebuilds it
pub fn reset_cache_manager() {
    *CACHE_MANAGER.write() = None;
}
