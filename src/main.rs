use anyhow::Context;
use romi_teleop::cmd_args::CommandLineArgs;
use romi_teleop::domain::settings::SettingsService;
use romi_teleop::infrastructure::bluetooth::protocol::DeviceAddress;
use romi_teleop::infrastructure::bluetooth::BleTransport;
use romi_teleop::infrastructure::keyboard::TerminalKeyboard;
use romi_teleop::infrastructure::logging;
use romi_teleop::session::{self, Interrupt};
use romi_teleop::transport::ConnectTarget;
use tracing::{info, warn};

// Bluetooth writes run on this single thread; keyboard input has its own.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CommandLineArgs::parse();

    let mut settings_service = match args.config() {
        Some(path) => SettingsService::with_path(path.clone()),
        None => SettingsService::new()?,
    };

    let _logging_guard =
        logging::init_logger(&settings_service.get().log_settings, args.log_level())
            .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
            .ok();

    info!("Starting Romi teleop");

    let raw_address = args
        .address()
        .map(str::to_string)
        .or_else(|| settings_service.get().last_address.clone())
        .context("no device address given and none remembered")?;
    let address = DeviceAddress::parse(&raw_address)?;

    if let Err(e) = settings_service.remember_address(address.as_str()) {
        warn!(
            "Could not save settings to {}: {}",
            settings_service.path().display(),
            e
        );
    }

    let settings = settings_service.get();
    let mut target = ConnectTarget::from_settings(address, settings)
        .context("invalid UUID in settings")?;
    if let Some(timeout) = args.timeout() {
        target = target.with_timeout(timeout);
    }

    let interrupt = Interrupt::new();
    let signal_interrupt = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_interrupt.trigger();
        }
    });

    let transport = BleTransport::new().await?;
    let mut keyboard = TerminalKeyboard::new();

    session::run_forever(
        &transport,
        &mut keyboard,
        &target,
        &interrupt,
        settings.retry_delay(),
    )
    .await?;

    info!("Goodbye");
    Ok(())
}
