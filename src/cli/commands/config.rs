use crate::cli::parser::Commands;
use crate::config::Config;
use crate::config::migrate::{add_missing_keys, missing_keys};
use crate::errors::AppResult;
use crate::ui::messages::{info, success, warning};

/// Handle the `config` subcommand
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        check,
        migrate,
    } = cmd
    {
        let path = Config::config_file();

        // ---- PRINT CONFIG ----
        if *print_config {
            println!("📄 Current configuration ({}):\n", path.display());
            println!("{}", serde_yaml::to_string(cfg)?);
        }

        // ---- CHECK ----
        if *check {
            let missing = missing_keys(&path)?;
            if missing.is_empty() {
                success("Configuration file is complete.");
            } else {
                warning(format!("Missing configuration keys: {}", missing.join(", ")));
                info("Run `rcheckin config --migrate` to add them with default values.");
            }
        }

        // ---- MIGRATE ----
        if *migrate && !add_missing_keys(&path, cfg)? {
            info("Configuration already up to date.");
        }
    }

    Ok(())
}
