use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use geotrack_logic::{
    AppLifecycle, GeoPoint, LocationSampler, PermissionCoordinator, PermissionKey,
    PermissionStatus, TaskController, TrackerSettings,
};
use geotrack_sim::{
    PrintSender, SimForeground, SimLocation, SimPermissions, SimPrompt, prelude::*,
};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StatusValue {
    Granted,
    Denied,
    Blocked,
    Unavailable,
    Limited,
}

impl From<StatusValue> for PermissionStatus {
    fn from(value: StatusValue) -> Self {
        match value {
            StatusValue::Granted => PermissionStatus::Granted,
            StatusValue::Denied => PermissionStatus::Denied,
            StatusValue::Blocked => PermissionStatus::Blocked,
            StatusValue::Unavailable => PermissionStatus::Unavailable,
            StatusValue::Limited => PermissionStatus::Limited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum KeyValue {
    Location,
    Background,
}

impl From<KeyValue> for PermissionKey {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::Location => PermissionKey::Location,
            KeyValue::Background => PermissionKey::BackgroundLocation,
        }
    }
}

#[derive(Parser)]
/// Run the location tracker against simulated permissions and GPS, commands are read from stdin
struct Cli {
    /// Initial status of the precise location permission
    #[arg(long, value_enum, default_value = "denied")]
    location: StatusValue,
    /// Initial status of the background location permission
    #[arg(long, value_enum, default_value = "denied")]
    background: StatusValue,
    /// What the simulated user answers when prompted for a permission
    #[arg(long, value_enum, default_value = "granted")]
    answer: StatusValue,
    /// Choose "Set Setting" when asked to open system settings
    #[arg(long)]
    open_settings: bool,
    /// Grant everything while in system settings
    #[arg(long)]
    grant_in_settings: bool,
    /// Milliseconds between samples
    #[arg(long, default_value_t = 500)]
    delay_ms: u32,
    /// Rounds of permission requests before giving up on a denied permission
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
    /// Latitude distances are measured from
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    origin_lat: f64,
    /// Longitude distances are measured from
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    origin_lon: f64,
    /// Latitude the simulated device starts at
    #[arg(long, default_value_t = 43.0845, allow_hyphen_values = true)]
    start_lat: f64,
    /// Longitude the simulated device starts at
    #[arg(long, default_value_t = -77.6749, allow_hyphen_values = true)]
    start_lon: f64,
    /// Max degrees the device moves between samples
    #[arg(long, default_value_t = 0.0005)]
    step: f64,
    /// Chance out of 100 that a location read fails
    #[arg(long, default_value_t = 0)]
    fail_percent: u32,
}

impl Cli {
    fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            task_delay_ms: self.delay_ms,
            origin: GeoPoint::new(self.origin_lat, self.origin_lon),
            max_permission_attempts: self.max_attempts,
            ..Default::default()
        }
    }
}

#[derive(Parser)]
#[command(no_binary_name = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand)]
enum ConsoleCommand {
    /// Start tracking
    Start,
    /// Stop tracking
    Stop,
    /// Show whether tracking is running and the permission statuses
    Status,
    /// Request any missing permissions
    Ensure,
    /// Send the app to the background
    Background,
    /// Bring the app back to the foreground
    Resume,
    /// Change a permission as if the user did it from system settings
    Set {
        #[arg(value_enum)]
        key: KeyValue,
        #[arg(value_enum)]
        status: StatusValue,
    },
    /// Exit the simulator
    Quit,
}

type Coordinator = PermissionCoordinator<SimPermissions, SimPrompt>;
type Controller = TaskController<SimPermissions, SimPrompt, SimForeground>;
type SimSampler = LocationSampler<SimLocation, SimPermissions, SimPrompt, PrintSender>;

struct Simulator {
    cli: Cli,
    permissions: SimPermissions,
    coordinator: Arc<Coordinator>,
    controller: Controller,
}

impl Simulator {
    fn new(cli: Cli) -> Self {
        let permissions =
            SimPermissions::new(cli.location.into(), cli.background.into(), cli.answer.into());
        let prompt = SimPrompt::new(permissions.clone(), cli.open_settings, cli.grant_in_settings);
        let coordinator = Arc::new(PermissionCoordinator::new(
            permissions.clone(),
            prompt,
            cli.max_attempts,
        ));
        let controller = TaskController::new(coordinator.clone(), SimForeground);

        Self {
            cli,
            permissions,
            coordinator,
            controller,
        }
    }

    async fn start(&self) -> Result {
        let settings = self.cli.settings();
        let location = SimLocation::new(
            self.permissions.clone(),
            GeoPoint::new(self.cli.start_lat, self.cli.start_lon),
            self.cli.step,
            self.cli.fail_percent,
        );
        let sampler = Arc::new(SimSampler::new(
            location,
            self.coordinator.clone(),
            PrintSender,
            settings.origin,
            settings.position_options(),
        ));
        let outcome = self
            .controller
            .start(sampler, &settings.service_options())
            .await?;
        info!("Start: {outcome:?}");
        Ok(())
    }

    /// Returns whether the simulator should exit
    async fn handle(&self, command: ConsoleCommand) -> Result<bool> {
        match command {
            ConsoleCommand::Start => self.start().await?,
            ConsoleCommand::Stop => self.controller.stop().await?,
            ConsoleCommand::Status => {
                let running = self.controller.is_running().await;
                let report = self.coordinator.check_permission().await;
                info!("Running: {running}, permissions: {report:?}");
            }
            ConsoleCommand::Ensure => match self.coordinator.ensure_permission().await {
                Ok(report) => info!("Permissions granted: {report:?}"),
                Err(why) => warn!("{why}"),
            },
            ConsoleCommand::Background => {
                self.coordinator
                    .handle_lifecycle_change(AppLifecycle::Background)
                    .await;
            }
            ConsoleCommand::Resume => {
                match self
                    .coordinator
                    .handle_lifecycle_change(AppLifecycle::Active)
                    .await
                {
                    Some(report) => info!("Back from settings, permissions: {report:?}"),
                    None => info!("Resumed"),
                }
            }
            ConsoleCommand::Set { key, status } => {
                self.permissions.set(key.into(), status.into());
            }
            ConsoleCommand::Quit => return Ok(true),
        }
        Ok(false)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();
    let sim = Simulator::new(cli);

    info!("Simulator ready, type `help` for commands");

    if let Err(why) = sim.coordinator.ensure_permission().await {
        warn!("{why}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match ConsoleLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed.command,
            Err(why) => {
                println!("{why}");
                continue;
            }
        };

        match sim.handle(command).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(why) => error!("{why:#}"),
        }
    }

    sim.controller.stop().await
}
