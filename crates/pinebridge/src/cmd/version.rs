use pine_transport::KNOWN_TARGETS;
use serde::Serialize;

use crate::cmd::{Context, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, Record};

#[derive(Serialize)]
struct TargetSlot {
    name: &'static str,
    slot: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    build_target: &'static str,
    build_profile: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    platform: &'static str,
    socket_dir: String,
    targets: Vec<TargetSlot>,
}

impl VersionInfo {
    fn collect(ctx: &Context) -> Self {
        let resolver = ctx.resolver();
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build_target: option_env!("PINEBRIDGE_BUILD_TARGET").unwrap_or("unknown"),
            build_profile: option_env!("PINEBRIDGE_BUILD_PROFILE").unwrap_or("unknown"),
            rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            platform: resolver.platform().as_str(),
            socket_dir: resolver.socket_dir().display().to_string(),
            targets: KNOWN_TARGETS
                .iter()
                .map(|t| TargetSlot {
                    name: t.name,
                    slot: t.default_slot,
                })
                .collect(),
        }
    }

    fn record(&self) -> Record {
        let targets = self
            .targets
            .iter()
            .map(|t| format!("{}:{}", t.name, t.slot))
            .collect::<Vec<_>>()
            .join(", ");
        Record::new(self.version)
            .field("Name", self.name)
            .field("Version", self.version)
            .field("Build target", self.build_target)
            .field("Build profile", self.build_profile)
            .field("Rustc", self.rustc)
            .field("Git hash", self.git_hash)
            .field("Platform", self.platform)
            .field("Socket dir", &self.socket_dir)
            .field("Targets", targets)
    }
}

pub fn run(args: VersionArgs, ctx: &Context) -> CliResult<i32> {
    if !args.extended {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = VersionInfo::collect(ctx);
    print_record(&info, &info.record(), ctx.format);
    Ok(SUCCESS)
}
