use pine_transport::KNOWN_TARGETS;
use serde::Serialize;

use crate::cmd::{Context, TargetsArgs};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::print_rows;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetOutput {
    name: &'static str,
    default_slot: u16,
    endpoint: String,
}

pub fn run(_args: TargetsArgs, ctx: &Context) -> CliResult<i32> {
    let resolver = ctx.resolver();
    let mut targets = Vec::with_capacity(KNOWN_TARGETS.len());
    for target in KNOWN_TARGETS {
        let descriptor = resolver
            .resolve(target.name, 0)
            .map_err(|err| transport_error("resolve failed", err))?;
        targets.push(TargetOutput {
            name: target.name,
            default_slot: target.default_slot,
            endpoint: descriptor.primary().to_string(),
        });
    }

    let rows: Vec<Vec<String>> = targets
        .iter()
        .map(|t| vec![t.name.to_string(), t.default_slot.to_string(), t.endpoint.clone()])
        .collect();
    print_rows(&targets, &["TARGET", "DEFAULT SLOT", "ENDPOINT"], &rows, ctx.format);
    Ok(SUCCESS)
}
