//! Wiring shared by the commands that drive the session manager.

use crate::cli::parser::PositionArgs;
use crate::config::Config;
use crate::core::geocoding;
use crate::core::{FixedGeolocator, LocationResolver, SessionManager, SystemClock};
use crate::errors::AppResult;
use crate::models::coords::Coordinates;
use crate::models::record::{AttendanceRecord, RecordId, UserId};
use crate::models::session_view::SessionView;
use crate::store::{RecordStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An attached manager plus the store it reads from.
pub struct Session {
    pub manager: SessionManager,
    pub store: Arc<SqliteStore>,
    pub confirm_timeout: Duration,
}

/// Coordinates from `--lat/--lon`, else from the config file.
fn position(cfg: &Config, args: Option<&PositionArgs>) -> AppResult<Option<Coordinates>> {
    match args {
        Some(PositionArgs {
            lat: Some(lat),
            lon: Some(lon),
        }) => Coordinates::new(*lat, *lon).map(Some),
        _ => cfg.position.coordinates(),
    }
}

impl Session {
    /// Open the store, attach a manager and wait for the first snapshot.
    pub async fn open(cfg: &Config, args: Option<&PositionArgs>) -> AppResult<Self> {
        let store = Arc::new(SqliteStore::open(&cfg.database, cfg.poll_interval())?);

        let geolocator = FixedGeolocator::new(position(cfg, args)?, cfg.position.enabled);
        let resolver =
            LocationResolver::new(Arc::new(geolocator), geocoding::from_config(&cfg.geocoder)?);

        let manager = SessionManager::new(
            UserId::new(cfg.user_id.clone()),
            store.clone(),
            resolver,
            Arc::new(SystemClock),
        );
        let confirm_timeout = cfg.confirm_timeout();

        manager.attach().await?;
        let view = manager
            .wait_for(confirm_timeout, SessionView::is_known)
            .await;
        if let Err(e) = view {
            manager.teardown();
            return Err(e);
        }
        debug!(database = %cfg.database, "session ready");

        Ok(Self {
            manager,
            store,
            confirm_timeout,
        })
    }

    /// Fresh copy of one record, read straight from the store.
    pub async fn record(&self, id: &RecordId) -> AppResult<Option<AttendanceRecord>> {
        let records = self.store.snapshot(self.manager.user()).await?;
        Ok(records.into_iter().find(|r| &r.id == id))
    }

    pub fn close(self) {
        self.manager.teardown();
    }
}
