use expander_device::{configure_pwm, PwmSettings, RegisterWrite};
use expander_registers::{names, PwmChannels};

use crate::cmd::{apply_writes, PwmArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS};
use crate::output::{print_writes, OutputFormat};

pub fn run(args: PwmArgs, format: OutputFormat) -> CliResult<i32> {
    let channels = parse_channels(&args.channels)?;
    let mut writes = configure_pwm(&PwmSettings {
        channels,
        frequency: args.frequency,
        duty_cycle: args.duty_cycle,
        pulse_count: args.pulse_count,
    })
    .map_err(|err| device_error("invalid PWM settings", err))?;

    if args.start {
        writes.push(
            RegisterWrite::named(names::PWM_START, channels)
                .map_err(|err| device_error("invalid PWM settings", err))?,
        );
    }

    if args.dry_run {
        print_writes(&writes, false, format);
    } else {
        apply_writes(&args.connect, &writes, format)?;
    }
    Ok(SUCCESS)
}

fn parse_channels(indices: &[u8]) -> CliResult<PwmChannels> {
    indices
        .iter()
        .map(|&index| {
            PwmChannels::channel(index)
                .ok_or_else(|| CliError::usage(format!("no PWM channel {index} (valid: 0-2)")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_collect_into_a_set() {
        assert_eq!(
            parse_channels(&[2, 0]).unwrap(),
            PwmChannels::PWM0 | PwmChannels::PWM2
        );
        assert!(parse_channels(&[3]).is_err());
    }
}
