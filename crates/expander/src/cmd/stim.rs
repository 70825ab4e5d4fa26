use expander_device::{configure_stim, RegisterWrite, StimSettings};
use expander_registers::{names, StimChannels};

use crate::cmd::{apply_writes, StimArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS};
use crate::output::{print_writes, OutputFormat};

pub fn run(args: StimArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = args
        .channels
        .iter()
        .map(|&index| {
            StimChannels::channel(index)
                .ok_or_else(|| CliError::usage(format!("no stimulation channel {index}")))
        })
        .collect::<CliResult<StimChannels>>()?;

    let mut writes = configure_stim(&StimSettings {
        channels,
        on_time: args.on_time,
        off_time: args.off_time,
        pulse_count: args.pulse_count,
    })
    .map_err(|err| device_error("invalid stimulation settings", err))?;

    if args.start {
        writes.push(
            RegisterWrite::named(names::STIM_START, channels)
                .map_err(|err| device_error("invalid stimulation settings", err))?,
        );
    }

    if args.dry_run {
        print_writes(&writes, false, format);
    } else {
        apply_writes(&args.connect, &writes, format)?;
    }
    Ok(SUCCESS)
}
