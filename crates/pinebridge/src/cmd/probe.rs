use pine_transport::{Connection, ExchangeLock, Resolver};
use serde::Serialize;

use crate::cmd::{Context, ProbeArgs};
use crate::exit::{transport_error, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::print_rows;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeOutput {
    target: String,
    slot: u16,
    endpoint: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: ProbeArgs, ctx: &Context) -> CliResult<i32> {
    let resolver = ctx.resolver();
    let lock = ExchangeLock::new();

    let candidates: Vec<(String, u16)> = match args.target {
        Some(target) => vec![(target, args.slot.unwrap_or(0))],
        None => ctx
            .session_config()
            .targets
            .into_iter()
            .map(|target| (target, 0))
            .collect(),
    };

    let mut results = Vec::with_capacity(candidates.len());
    for (target, slot) in candidates {
        results.push(probe_one(&resolver, &lock, ctx, &target, slot)?);
    }

    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.target.clone(),
                r.slot.to_string(),
                r.endpoint.clone(),
                if r.reachable { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_rows(
        &results,
        &["TARGET", "SLOT", "ENDPOINT", "REACHABLE"],
        &rows,
        ctx.format,
    );

    if results.iter().any(|r| r.reachable) {
        Ok(SUCCESS)
    } else {
        Ok(TRANSPORT_ERROR)
    }
}

fn probe_one(
    resolver: &Resolver,
    lock: &ExchangeLock,
    ctx: &Context,
    target: &str,
    slot: u16,
) -> CliResult<ProbeOutput> {
    let descriptor = resolver
        .resolve(target, slot)
        .map_err(|err| transport_error("resolve failed", err))?;
    let slot = descriptor.slot();
    let endpoint = descriptor.primary().to_string();

    let conn = Connection::with_config(descriptor, ctx.connection_config(), lock.clone());
    let (reachable, error) = match conn.probe() {
        Ok(()) => (true, None),
        Err(err) => {
            tracing::debug!(emulator = target, error = %err, "probe failed");
            (false, Some(err.to_string()))
        }
    };

    Ok(ProbeOutput {
        target: target.to_string(),
        slot,
        endpoint,
        reachable,
        error,
    })
}
