use anyhow::Context;
use fleetgate_core::Error;
use fleetgate_policy::{AclEntry, GrantDecision, HostKind, HostRecord, Principal};
use serde_json::json;

use super::load_config;
use crate::cli::args::{CheckArgs, HostArg, OutputFormat};
use crate::exit_codes;

fn principal(args: &CheckArgs) -> Principal {
    match args.host {
        Some(HostArg::Client) => {
            Principal::host(HostRecord::new(args.user.to_lowercase(), HostKind::Client))
        }
        Some(HostArg::Depot) => {
            Principal::host(HostRecord::new(args.user.to_lowercase(), HostKind::DepotServer))
        }
        None => Principal::user(&args.user, &args.groups),
    }
}

fn describe(entry: &AclEntry) -> String {
    let mut out = entry.entry_type().to_string();
    if !entry.ids().is_empty() {
        let ids: Vec<&str> = entry.ids().iter().map(String::as_str).collect();
        out.push_str(&format!("({})", ids.join(",")));
    }
    if let Some(allow) = entry.allow_attributes() {
        let attrs: Vec<&str> = allow.iter().map(String::as_str).collect();
        out.push_str(&format!(" allow=[{}]", attrs.join(",")));
    }
    if let Some(deny) = entry.deny_attributes() {
        let attrs: Vec<&str> = deny.iter().map(String::as_str).collect();
        out.push_str(&format!(" deny=[{}]", attrs.join(",")));
    }
    out
}

pub fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let acl = match config.acl_table() {
        Ok(acl) => acl,
        Err(e) => {
            let err = Error::from(e);
            eprintln!("error: {err}");
            return Ok(err.exit_code());
        }
    };

    let principal = principal(&args);
    let evaluations: Vec<_> = args
        .operations
        .iter()
        .map(|op| (op.as_str(), acl.explain(op, &principal)))
        .collect();
    let any_denied = evaluations
        .iter()
        .any(|(_, eval)| eval.decision == GrantDecision::Denied);

    match args.format {
        OutputFormat::Text => {
            for (operation, eval) in &evaluations {
                let rule = match eval.rule_index {
                    Some(index) => format!("rule #{index}, {} entries evaluated", eval.evaluated),
                    None => "no matching rule".to_string(),
                };
                match &eval.decision {
                    GrantDecision::Partial(entries) => {
                        let entries: Vec<String> = entries.iter().map(describe).collect();
                        println!("{operation}: partial [{}] ({rule})", entries.join("; "));
                    }
                    decision => println!("{operation}: {} ({rule})", decision.as_str()),
                }
            }
        }
        OutputFormat::Json => {
            let report: Vec<_> = evaluations
                .iter()
                .map(|(operation, eval)| {
                    let entries: Vec<String> = match &eval.decision {
                        GrantDecision::Partial(entries) => entries.iter().map(describe).collect(),
                        _ => Vec::new(),
                    };
                    json!({
                        "operation": operation,
                        "principal": principal.name(),
                        "decision": eval.decision.as_str(),
                        "rule_index": eval.rule_index,
                        "evaluated": eval.evaluated,
                        "entries": entries,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render decisions")?
            );
        }
    }

    if any_denied {
        Ok(exit_codes::DENIED)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}
