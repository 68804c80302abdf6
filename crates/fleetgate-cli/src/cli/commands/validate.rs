use anyhow::Context;
use fleetgate_core::Error;
use serde_json::json;

use super::load_config;
use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::exit_codes;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };

    let compiled = config
        .dispatch_table()
        .and_then(|dispatch| Ok((dispatch, config.acl_table()?)));
    let (dispatch, acl) = match compiled {
        Ok(tables) => tables,
        Err(e) => {
            let err = Error::from(e);
            eprintln!("error: {err}");
            return Ok(err.exit_code());
        }
    };

    let default_acl = config.acl.is_empty();
    match args.format {
        OutputFormat::Text => {
            println!("configuration: {}", args.config.config.display());
            println!("dispatch rules: {}", dispatch.len());
            println!("backends: {}", dispatch.backend_names().join(", "));
            if default_acl {
                println!("acl rules: 0 (default: members of '{}' only)", config.admin_group);
            } else {
                println!("acl rules: {}", acl.len());
            }
            println!("types: {}", config.type_catalog().len());
        }
        OutputFormat::Json => {
            let report = json!({
                "configuration": args.config.config.display().to_string(),
                "dispatch_rules": dispatch.len(),
                "backends": dispatch.backend_names(),
                "acl_rules": acl.len(),
                "default_acl": default_acl,
                "admin_group": config.admin_group,
                "types": config.type_catalog().len(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report")?
            );
        }
    }
    tracing::debug!(rules = dispatch.len(), "configuration valid");
    Ok(exit_codes::SUCCESS)
}
