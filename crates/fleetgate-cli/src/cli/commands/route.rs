use anyhow::Context;
use fleetgate_core::Error;
use serde_json::json;
use std::collections::BTreeSet;

use super::load_config;
use crate::cli::args::{OutputFormat, RouteArgs};
use crate::exit_codes;

pub fn run(args: RouteArgs) -> anyhow::Result<i32> {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let dispatch = match config.dispatch_table() {
        Ok(dispatch) => dispatch,
        Err(e) => {
            let err = Error::from(e);
            eprintln!("error: {err}");
            return Ok(err.exit_code());
        }
    };

    let available: BTreeSet<&str> = if args.backends.is_empty() {
        dispatch.backend_names().into_iter().collect()
    } else {
        args.backends.iter().map(String::as_str).collect()
    };

    let mut routes = Vec::with_capacity(args.operations.len());
    for operation in &args.operations {
        let rule = dispatch.rule_for(operation).map(|rule| rule.pattern().to_string());
        let backends = dispatch.resolve(operation, |name| available.contains(name));
        routes.push((operation.as_str(), rule, backends));
    }

    match args.format {
        OutputFormat::Text => {
            for (operation, rule, backends) in &routes {
                match rule {
                    Some(pattern) if backends.is_empty() => println!(
                        "{operation}: not exposed (rule '{pattern}', no available backend)"
                    ),
                    Some(pattern) => {
                        println!("{operation}: {} (rule '{pattern}')", backends.join(", "))
                    }
                    None => println!("{operation}: not exposed (no matching rule)"),
                }
            }
        }
        OutputFormat::Json => {
            let report: Vec<_> = routes
                .iter()
                .map(|(operation, rule, backends)| {
                    json!({
                        "operation": operation,
                        "rule": rule,
                        "backends": backends,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render routes")?
            );
        }
    }
    Ok(exit_codes::SUCCESS)
}
