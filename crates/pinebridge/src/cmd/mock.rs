use std::io::Write;
use std::sync::Arc;

use pine_frame::ResultCode;
use pine_session::{EmulatorProfile, StubEmulator};
use pine_transport::PineListener;
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, Context, MockArgs};
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_record, Record};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListeningOutput {
    target: String,
    slot: u16,
    endpoint: String,
    forced_result_code: Option<u8>,
}

pub fn run(args: MockArgs, ctx: &Context) -> CliResult<i32> {
    let descriptor = ctx
        .resolver()
        .resolve(&args.target, args.slot)
        .map_err(|err| transport_error("resolve failed", err))?;
    tracing::Span::current().record("target", descriptor.target());
    let listener =
        PineListener::bind(&descriptor).map_err(|err| transport_error("bind failed", err))?;

    let emulator = Arc::new(StubEmulator::new(EmulatorProfile::for_target(&args.target)));
    emulator.force_result(args.result_code.map(ResultCode::from));

    let handle = emulator
        .serve(listener)
        .map_err(|err| io_error("stub emulator start failed", err))?;
    let stopper = handle.stopper();
    install_ctrlc_handler(move || stopper.stop())?;

    let out = ListeningOutput {
        target: descriptor.target().to_string(),
        slot: descriptor.slot(),
        endpoint: handle.endpoint().to_string(),
        forced_result_code: args.result_code,
    };
    let record = Record::new(out.endpoint.clone())
        .field("Target", &out.target)
        .field("Slot", out.slot)
        .field("Endpoint", &out.endpoint);
    print_record(&out, &record, ctx.format);
    let _ = std::io::stdout().flush();

    handle.join();
    Ok(SUCCESS)
}
