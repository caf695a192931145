//! Config inspection. Never touches the hub.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let rendered = match global.output {
                OutputFormat::Json | OutputFormat::JsonCompact => output::render_single(
                    &global.output,
                    &cfg,
                    |_| String::new(),
                    |_| String::new(),
                ),
                // TOML for table and plain; it is the file's own syntax.
                _ => toml::to_string(&cfg).map_err(|e| CliError::Validation {
                    field: "config".into(),
                    reason: e.to_string(),
                })?,
            };
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }
    }
}
