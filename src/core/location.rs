//! Location resolution for check-in and check-out.
//!
//! Two failure classes are kept apart:
//! - the device cannot give a position (`CapabilityError`): the command
//!   must abort before anything is written;
//! - the address lookup fails: not an error, the coordinates are used.

use crate::core::geocoding::Geocoder;
use crate::errors::CapabilityError;
use crate::models::coords::Coordinates;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// One-shot current position query.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, CapabilityError>;
}

/// Position taken from configuration or the command line.
#[derive(Debug, Clone)]
pub struct FixedGeolocator {
    position: Option<Coordinates>,
    permitted: bool,
}

impl FixedGeolocator {
    pub fn new(position: Option<Coordinates>, permitted: bool) -> Self {
        Self {
            position,
            permitted,
        }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self) -> Result<Coordinates, CapabilityError> {
        if !self.permitted {
            return Err(CapabilityError::PermissionDenied);
        }
        self.position.ok_or_else(|| {
            CapabilityError::Unavailable(
                "no position configured (set position.latitude/longitude or pass --lat/--lon)"
                    .into(),
            )
        })
    }
}

#[derive(Clone)]
pub struct LocationResolver {
    geolocator: Arc<dyn Geolocator>,
    geocoder: Arc<dyn Geocoder>,
}

impl LocationResolver {
    pub fn new(geolocator: Arc<dyn Geolocator>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geolocator,
            geocoder,
        }
    }

    /// Query the device position and turn it into an address.
    pub async fn locate(&self) -> Result<String, CapabilityError> {
        let coords = self.geolocator.current_position().await?;
        Ok(self.resolve(coords).await)
    }

    /// Address for `coords`, or `"Lat: {lat}, Lon: {lng}"` when the lookup
    /// fails or finds nothing. Never fails.
    pub async fn resolve(&self, coords: Coordinates) -> String {
        match self.geocoder.reverse(coords).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                debug!(
                    lat = coords.latitude,
                    lon = coords.longitude,
                    "no address for position, using coordinates"
                );
                coords.fallback_label()
            }
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed, using coordinates");
                coords.fallback_label()
            }
        }
    }
}
