use std::collections::BTreeMap;

use pine_frame::{Answer, Request};
use pine_session::Session;
use serde::Serialize;

use crate::cmd::{Context, RequestArgs};
use crate::exit::{
    frame_error, result_code_exit, session_error, CliError, CliResult, TRANSPORT_ERROR,
};
use crate::output::{print_record, Record};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeOutput<'a> {
    target: &'a str,
    #[serde(flatten)]
    answer: &'a Answer,
}

pub fn run(args: RequestArgs, ctx: &Context) -> CliResult<i32> {
    let params: BTreeMap<String, String> = args.params.into_iter().collect();
    let request = Request::from_params(&args.operation, &params)
        .map_err(|err| frame_error("invalid request", err))?;

    let session = Session::new(ctx.session_config());
    let target = match &args.target {
        Some(target) => {
            session
                .connect_to(target, args.slot.unwrap_or(0))
                .map_err(|err| session_error("connect failed", err))?;
            target.clone()
        }
        None => session.probe_targets().ok_or_else(|| {
            CliError::new(
                TRANSPORT_ERROR,
                format!(
                    "no emulator reachable (tried {})",
                    session.config().targets.join(", ")
                ),
            )
        })?,
    };

    tracing::Span::current().record("target", target.as_str());

    let answer = session
        .exchange(&request)
        .map_err(|err| session_error("exchange failed", err))?;
    tracing::info!(
        emulator = %target,
        operation = %answer.opcode(),
        result_code = u8::from(answer.result_code()),
        "exchange complete"
    );

    print_answer(&target, &answer, ctx);
    Ok(result_code_exit(answer.result_code()))
}

fn print_answer(target: &str, answer: &Answer, ctx: &Context) {
    let out = ExchangeOutput { target, answer };

    let mut record = Record::new(raw_value(answer))
        .field("Operation", answer.opcode())
        .field("Target", target)
        .field("Result code", u8::from(answer.result_code()));
    if let Some(value) = answer.value() {
        record = record.field("Value", format!("{value:#x} ({value})"));
    }
    if let Some(text) = answer.text() {
        record = record.field("Text", text);
    }

    print_record(&out, &record, ctx.format);
}

fn raw_value(answer: &Answer) -> String {
    if let Some(text) = answer.text() {
        return text.to_string();
    }
    match answer.value() {
        Some(value) => format!("{value:#x}"),
        None => u8::from(answer.result_code()).to_string(),
    }
}
