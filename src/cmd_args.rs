use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Drive a Romi robot over BLE with the arrow keys", long_about = None)]
struct ClapArgs {
    /// Device address, XX:XX:XX:XX:XX:XX (or the peripheral UUID on macOS).
    /// Defaults to the last address used.
    #[arg(value_name = "ADDRESS")]
    address: Option<String>,

    #[arg(
        short = 't',
        long,
        value_name = "SECONDS",
        value_parser = parse_timeout,
        help = "timeout when searching for the device [default: 10]"
    )]
    timeout: Option<Duration>,

    #[arg(long, value_name = "FILE", help = "settings file to use instead of the default")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", help = "log level or filter, e.g. debug")]
    log_level: Option<String>,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("{value:?} is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("{value:?} is not a usable timeout (negative or too large)"))
}

#[derive(Debug, Clone)]
pub struct CommandLineArgs {
    address: Option<String>,
    timeout: Option<Duration>,
    config: Option<PathBuf>,
    log_level: Option<String>,
}

impl CommandLineArgs {
    pub fn parse() -> Self {
        Self::from_clap(ClapArgs::parse())
    }

    pub fn parse_from<I, T>(itr: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::from_clap(ClapArgs::parse_from(itr))
    }

    fn from_clap(args: ClapArgs) -> Self {
        Self {
            address: args.address,
            timeout: args.timeout,
            config: args.config,
            log_level: args.log_level,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn config(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }
}
