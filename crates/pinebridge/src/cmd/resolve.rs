use pine_transport::TransportDescriptor;
use serde::Serialize;

use crate::cmd::{Context, ResolveArgs};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_record, Record};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveOutput {
    target: String,
    slot: u16,
    platform: &'static str,
    kind: &'static str,
    primary: String,
    fallback: Option<String>,
}

impl ResolveOutput {
    fn new(descriptor: &TransportDescriptor, platform: &'static str) -> Self {
        Self {
            target: descriptor.target().to_string(),
            slot: descriptor.slot(),
            platform,
            kind: descriptor.kind().as_str(),
            primary: descriptor.primary().to_string(),
            fallback: descriptor.fallback().map(ToString::to_string),
        }
    }
}

pub fn run(args: ResolveArgs, ctx: &Context) -> CliResult<i32> {
    let resolver = ctx.resolver();
    let descriptor = resolver
        .resolve(&args.target, args.slot)
        .map_err(|err| transport_error("resolve failed", err))?;
    let out = ResolveOutput::new(&descriptor, resolver.platform().as_str());

    let record = Record::new(out.primary.clone())
        .field("Target", &out.target)
        .field("Slot", out.slot)
        .field("Platform", out.platform)
        .field("Kind", out.kind)
        .field("Primary", &out.primary)
        .field("Fallback", out.fallback.as_deref().unwrap_or("-"));
    print_record(&out, &record, ctx.format);
    Ok(SUCCESS)
}
