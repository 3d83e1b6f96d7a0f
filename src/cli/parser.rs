use clap::{Parser, Subcommand};

/// Command-line interface definition for rcheckin
/// Location-verified attendance with rotating check-in codes, backed by SQLite
#[derive(Parser)]
#[command(
    name = "rcheckin",
    version = env!("CARGO_PKG_VERSION"),
    about = "Attendance check-in CLI: rotating tokens, geofence and time window checks on SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Manage the configuration file
    Config {
        #[arg(long = "print", help = "Print the current configuration file")]
        print_config: bool,

        #[arg(long = "check", help = "Check configuration file for missing fields")]
        check: bool,

        #[arg(long = "migrate", help = "Run configuration file migrations if needed")]
        migrate: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "vacuum", help = "Optimize the database using VACUUM")]
        vacuum: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Print the internal audit log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },

    /// Create and manage events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Show the rotating check-in token and the live attendance count
    Host {
        #[arg(long = "event", help = "Event id to host")]
        event: i64,

        #[arg(long = "once", help = "Print one token and the current count, then exit")]
        once: bool,
    },

    /// Check in to an event with a scanned token or deep link
    #[command(allow_negative_numbers = true)]
    Checkin {
        /// Raw token (CHECKIN-...) or a deep link carrying `?token=`
        token: String,

        #[arg(long = "lat", help = "Current latitude")]
        lat: f64,

        #[arg(long = "lng", help = "Current longitude")]
        lng: f64,

        #[arg(long = "accuracy", help = "Reported accuracy in meters")]
        accuracy: Option<f64>,

        #[arg(long = "user", help = "Authenticated user id", conflicts_with_all = ["name", "device"])]
        user: Option<i64>,

        #[arg(long = "name", help = "Guest name (full-tracking events)")]
        name: Option<String>,

        #[arg(long = "email", requires = "name", help = "Guest email (full-tracking events)")]
        email: Option<String>,

        #[arg(long = "device", help = "Device identifier for anonymous check-ins")]
        device: Option<String>,
    },

    /// Show committed attendance for an event
    Attendance {
        #[arg(long = "event", help = "Event id")]
        event: i64,

        #[arg(long = "date", help = "Session date (YYYY-MM-DD); all dates if omitted")]
        date: Option<String>,

        #[arg(long = "json", help = "Print records as JSON")]
        json: bool,

        #[arg(long = "count", help = "Only print the count for the date (default: today)")]
        count: bool,
    },
}

#[derive(Subcommand)]
pub enum EventAction {
    /// Create a new event
    #[command(allow_negative_numbers = true)]
    Add {
        /// Event name
        name: String,

        #[arg(long = "lat", help = "Anchor latitude")]
        lat: f64,

        #[arg(long = "lng", help = "Anchor longitude")]
        lng: f64,

        #[arg(long = "radius", help = "Check-in radius in meters (default from config)")]
        radius: Option<f64>,

        #[arg(long = "start", help = "Window start (HH:MM or HH:MM:SS)")]
        start: String,

        #[arg(long = "end", help = "Window end (HH:MM or HH:MM:SS)")]
        end: String,

        #[arg(
            long = "mode",
            default_value = "count",
            help = "Tracking mode: count | full"
        )]
        mode: String,

        #[arg(
            long = "on",
            conflicts_with = "weekly",
            help = "Single date (YYYY-MM-DD) the event runs on"
        )]
        on: Option<String>,

        #[arg(long = "weekly", help = "Weekdays the event runs on, e.g. mon,wed,fri")]
        weekly: Option<String>,
    },

    /// List all events
    List,

    /// Show one event
    Show {
        id: i64,
    },

    /// Replace the event secret, invalidating every issued token
    Rotate {
        id: i64,
    },

    /// Accept check-ins for an event again
    Activate {
        id: i64,
    },

    /// Stop accepting check-ins for an event
    Deactivate {
        id: i64,
    },
}
