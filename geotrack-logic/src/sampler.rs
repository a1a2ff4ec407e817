use std::sync::Arc;

use log::{error, info, warn};

use crate::{
    geo::{DistanceSample, GeoPoint},
    location::{LocationError, LocationService, PositionOptions},
    permission::{PermissionBackend, PermissionCoordinator, SettingsPrompt},
    prelude::*,
    scheduler::Sampler,
};

/// Receives every successful sample, used to push updates to the UI
pub trait SampleSender: Send + Sync {
    fn send_sample(&self, sample: &DistanceSample);
}

/// The body of the background task: read the position once, work out how far it is from
/// `origin` and report it.
pub struct LocationSampler<L, P, D, S>
where
    L: LocationService,
    P: PermissionBackend,
    D: SettingsPrompt,
    S: SampleSender,
{
    location: L,
    coordinator: Arc<PermissionCoordinator<P, D>>,
    sender: S,
    origin: GeoPoint,
    options: PositionOptions,
}

impl<L, P, D, S> LocationSampler<L, P, D, S>
where
    L: LocationService,
    P: PermissionBackend,
    D: SettingsPrompt,
    S: SampleSender,
{
    pub fn new(
        location: L,
        coordinator: Arc<PermissionCoordinator<P, D>>,
        sender: S,
        origin: GeoPoint,
        options: PositionOptions,
    ) -> Self {
        Self {
            location,
            coordinator,
            sender,
            origin,
            options,
        }
    }

    async fn repair_permission(&self) {
        match self.coordinator.ensure_permission().await {
            Ok(report) => info!("Location permission restored: {report:?}"),
            Err(why) => warn!("Location permission still missing: {why}"),
        }
    }

    /// Take one sample, errors are logged rather than returned so the loop keeps going
    pub async fn sample_once(&self) -> Option<DistanceSample> {
        match self.location.current_position(&self.options).await {
            Ok(position) => {
                let sample = DistanceSample::new(position, self.origin);
                info!("distance: {}", sample.distance_meters);
                self.sender.send_sample(&sample);
                Some(sample)
            }
            Err(why) => {
                error!("{} {why}", why.code());
                if why == LocationError::PermissionDenied {
                    self.repair_permission().await;
                }
                None
            }
        }
    }
}

impl<L, P, D, S> Sampler for LocationSampler<L, P, D, S>
where
    L: LocationService + 'static,
    P: PermissionBackend + 'static,
    D: SettingsPrompt + 'static,
    S: SampleSender + 'static,
{
    async fn sample(&self) -> Result {
        self.sample_once().await;
        Ok(())
    }
}
