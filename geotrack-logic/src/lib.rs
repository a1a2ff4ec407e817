mod controller;
mod geo;
mod location;
mod permission;
mod sampler;
mod scheduler;
mod settings;

pub use controller::{
    ForegroundService, ServiceNotification, ServiceOptions, StartOutcome, TASK_ID, TaskController,
};
pub use geo::{DistanceSample, EARTH_RADIUS_KM, GeoPoint, UtcDT, haversine_distance};
pub use location::{LocationError, LocationService, PositionOptions};
pub use permission::{
    AppLifecycle, PermissionBackend, PermissionCoordinator, PermissionError, PermissionKey,
    PermissionReport, PermissionStatus, Platform, SettingsPrompt,
};
pub use sampler::{LocationSampler, SampleSender};
pub use scheduler::{Sampler, TaskId, TaskOptions, TaskScheduler};
pub use settings::TrackerSettings;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
