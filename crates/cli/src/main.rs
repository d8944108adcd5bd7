use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slot_sentinel::commands::{
    add_command, check_command, init_command, list_command, remove_command, watch_command,
};

/// Appointment watcher for the Veneto vaccination portal.
///
/// This CLI is a thin wrapper around `sentinel-core` (exposed in code as
/// `sentinel_core`). All substantive logic lives in the library so it can
/// be tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "slot-sentinel",
    version,
    about = "Watches the Veneto vaccination portal for open appointment slots",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a watcher home directory.
    ///
    /// This will:
    /// - Create a `.sentinel` metadata directory and a `reports` directory.
    /// - Write a `.sentinel/config.json` config file.
    /// - Create the subscription database.
    Init {
        /// Home directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        home: String,

        /// Portal base URL override (useful against a staging stub).
        #[arg(long)]
        base_url: Option<String>,

        /// Seconds the polling loop sleeps between cycles.
        #[arg(long)]
        cycle_seconds: Option<u64>,
    },

    /// Register a subscription in the watcher database.
    ///
    /// The identity is format-checked here; whether it actually exists is
    /// the portal's call, discovered on the first check.
    Add {
        /// Home directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        home: String,

        /// Delivery address handed to the outbound dispatcher (e.g. a chat id).
        #[arg(long)]
        contact: String,

        /// Regional health unit number (e.g. 6 for Euganea).
        #[arg(long)]
        ulss: u8,

        /// Fiscal code of the person to watch.
        #[arg(long)]
        fiscal_code: String,

        /// Last six digits of the health-insurance card.
        #[arg(long)]
        health_insurance_number: String,
    },

    /// List subscriptions registered in the watcher database.
    List {
        /// Home directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        home: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete a subscription.
    Remove {
        /// Home directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        home: String,

        /// Subscription id as shown by `list`.
        #[arg(long)]
        id: i64,
    },

    /// Run one check for a single identity and print the result.
    ///
    /// Does not touch the subscription database; useful for trying an
    /// identity out or for debugging the portal dialogue.
    Check {
        /// Regional health unit number.
        #[arg(long)]
        ulss: u8,

        /// Fiscal code to check.
        #[arg(long)]
        fiscal_code: String,

        /// Last six digits of the health-insurance card.
        #[arg(long)]
        health_insurance_number: String,

        /// Portal base URL override.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Run the polling loop until interrupted.
    Watch {
        /// Home directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        home: String,

        /// Run exactly this many cycles and exit (default: run forever).
        #[arg(long)]
        cycles: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            home,
            base_url,
            cycle_seconds,
        } => init_command(&home, base_url, cycle_seconds)?,
        Command::Add {
            home,
            contact,
            ulss,
            fiscal_code,
            health_insurance_number,
        } => add_command(&home, &contact, ulss, &fiscal_code, &health_insurance_number)?,
        Command::List { home, json } => list_command(&home, json)?,
        Command::Remove { home, id } => remove_command(&home, id)?,
        Command::Check {
            ulss,
            fiscal_code,
            health_insurance_number,
            base_url,
        } => check_command(ulss, &fiscal_code, &health_insurance_number, base_url)?,
        Command::Watch { home, cycles } => watch_command(&home, cycles)?,
    }

    Ok(())
}
