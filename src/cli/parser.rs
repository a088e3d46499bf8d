use crate::export::ExportFormat;
use clap::{Args, Parser, Subcommand};

/// Command-line interface definition for rattendance
#[derive(Parser)]
#[command(
    name = "rattendance",
    version = env!("CARGO_PKG_VERSION"),
    about = "Check in and out of work, stamping each transition with time and location",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Act as another user (defaults to the configured user_id)
    #[arg(global = true, long = "user")]
    pub user: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Position given on the command line, overriding the configured one.
#[derive(Args, Clone, Debug, Default)]
pub struct PositionArgs {
    #[arg(long = "lat", requires = "lon", allow_hyphen_values = true, help = "Latitude in degrees")]
    pub lat: Option<f64>,

    #[arg(long = "lon", requires = "lat", allow_hyphen_values = true, help = "Longitude in degrees")]
    pub lon: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Manage the configuration file (view or edit)
    Config {
        #[arg(long = "print", help = "Print the current configuration file")]
        print_config: bool,

        #[arg(
            long = "edit",
            help = "Edit the configuration file (default editor: $EDITOR, or nano/notepad)"
        )]
        edit_config: bool,

        #[arg(
            long = "editor",
            help = "Specify the editor to use (vim, nano, or custom path)"
        )]
        editor: Option<String>,
    },

    /// Check in at the current position
    In {
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Check out of the active session
    Out {
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Check in when idle, check out when checked in
    Toggle {
        #[command(flatten)]
        position: PositionArgs,
    },

    /// Show whether you are checked in and for how long
    Status,

    /// Follow the session live until Ctrl-C
    Watch,

    /// List attendance records, newest first
    List {
        #[arg(long, short = 'n', help = "Show at most N records")]
        limit: Option<usize>,
    },

    /// Export attendance records
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        #[arg(long, value_name = "FILE")]
        file: String,

        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Print or manage the internal log table
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },
}
