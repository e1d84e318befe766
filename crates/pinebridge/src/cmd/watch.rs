use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pine_frame::Request;
use pine_session::{EmulatorStatus, Session, SessionConfig, SessionState, Supervisor};
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, parse_duration, Context, WatchArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::{print_record, Record};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport<'a> {
    #[serde(flatten)]
    state: &'a SessionState,
    result_code: u8,
    status: Option<u32>,
    status_name: Option<EmulatorStatus>,
}

pub fn run(args: WatchArgs, ctx: &Context) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let retry_interval = parse_duration(&args.retry_interval)?;

    let session = Arc::new(Session::new(SessionConfig {
        retry_interval,
        ..ctx.session_config()
    }));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        install_ctrlc_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let supervisor = Supervisor::spawn(session.clone())
        .map_err(|err| io_error("supervisor start failed", err))?;

    let mut reports = 0usize;
    let mut last_state: Option<SessionState> = None;
    while running.load(Ordering::SeqCst) {
        let state = session.state();
        if last_state.as_ref() != Some(&state) {
            tracing::info!(state = %state, "session state");
        }

        if state.is_connected() {
            match session.exchange(&Request::Status) {
                Ok(answer) => {
                    let status = answer.value().map(|v| v as u32);
                    let report = StatusReport {
                        state: &state,
                        result_code: answer.result_code().into(),
                        status,
                        status_name: status.and_then(EmulatorStatus::from_u32),
                    };
                    print_report(&report, ctx);
                    reports += 1;
                    if args.count.is_some_and(|count| reports >= count) {
                        break;
                    }
                }
                // The supervisor reconnects after transport failures.
                Err(err) => tracing::warn!(error = %err, "status request failed"),
            }
        }

        last_state = Some(state);
        sleep_while_running(interval, &running);
    }

    supervisor.stop();
    session.disconnect();
    Ok(SUCCESS)
}

fn print_report(report: &StatusReport<'_>, ctx: &Context) {
    let status = match (report.status_name, report.status) {
        (Some(name), _) => name.as_str().to_string(),
        (None, Some(code)) => code.to_string(),
        (None, None) => "-".to_string(),
    };
    let record = Record::new(status.clone())
        .field("State", report.state)
        .field("Result code", report.result_code)
        .field("Status", status);
    print_record(report, &record, ctx.format);
}

fn sleep_while_running(duration: Duration, running: &AtomicBool) {
    let until = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let left = until.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        std::thread::sleep(left.min(Duration::from_millis(50)));
    }
}
