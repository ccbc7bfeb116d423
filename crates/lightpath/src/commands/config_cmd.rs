//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Resolved};
use crate::error::CliError;
use crate::output;

pub fn handle(
    args: &ConfigArgs,
    global: &GlobalOpts,
    cfg: &Config,
    settings: &Resolved,
) -> Result<(), CliError> {
    match args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let toml = cfg.to_toml()?;
            let out = output::render_single(
                settings.output,
                cfg,
                |_| toml.trim_end().to_owned(),
                |_| "config".into(),
            )?;
            output::print_output(&out, settings.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config::config_path);
            output::print_output(&path.display().to_string(), settings.quiet);
            Ok(())
        }
    }
}
