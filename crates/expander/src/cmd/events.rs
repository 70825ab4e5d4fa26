use std::collections::HashSet;
use std::future::{self, Future};

use expander_device::ExpanderError;
use expander_frame::Frame;
use expander_registers::{decode, RegisterMap};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::cmd::{resolve, runtime, EventsArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(args: EventsArgs, format: OutputFormat) -> CliResult<i32> {
    let filter = match &args.register {
        Some(names) => Some(
            names
                .iter()
                .map(|name| resolve(name).map(|d| d.address))
                .collect::<CliResult<HashSet<u8>>>()?,
        ),
        None => None,
    };

    runtime()?.block_on(async {
        let (device, _) = args.connect.connect().await?;
        let mut events = device.subscribe_events();
        let interrupted = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "cannot listen for Ctrl-C");
                future::pending::<()>().await;
            }
        };

        let outcome =
            print_events(&mut events, interrupted, filter.as_ref(), args.count, format).await;
        device.close().await;
        outcome.map_err(|err| device_error("event stream ended", err))
    })?;

    Ok(SUCCESS)
}

/// Print events until `stop` resolves, `count` events have been printed or
/// the stream closes. Returns the number printed.
async fn print_events(
    events: &mut broadcast::Receiver<Frame>,
    stop: impl Future<Output = ()>,
    filter: Option<&HashSet<u8>>,
    count: Option<usize>,
    format: OutputFormat,
) -> Result<usize, ExpanderError> {
    let map = RegisterMap::output_expander();
    let mut printed = 0usize;
    tokio::pin!(stop);

    loop {
        let frame = tokio::select! {
            _ = &mut stop => return Ok(printed),
            received = events.recv() => match received {
                Ok(frame) => frame,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                    continue;
                }
                Err(RecvError::Closed) => return Err(ExpanderError::Disconnected),
            },
        };

        if filter.is_some_and(|f| !f.contains(&frame.address)) {
            continue;
        }
        let Ok(descriptor) = map.by_address(frame.address) else {
            debug!(address = frame.address, "event from unmapped address");
            continue;
        };
        let value = match decode(descriptor, &frame) {
            Ok(value) => value,
            Err(err) => {
                warn!(register = descriptor.name, error = %err, "undecodable event");
                continue;
            }
        };

        print_event(
            descriptor,
            value,
            frame.timestamp.map(|t| t.as_secs_f64()),
            format,
        );
        printed = printed.saturating_add(1);
        if count.is_some_and(|count| printed >= count) {
            return Ok(printed);
        }
    }
}
