use expander_device::configure_magnetic_encoder;
use expander_registers::EncoderSampleRate;

use crate::cmd::{apply_writes, EncoderArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS};
use crate::output::{print_writes, OutputFormat};

pub fn run(args: EncoderArgs, format: OutputFormat) -> CliResult<i32> {
    let rate = parse_rate(&args.rate)?;
    let writes = configure_magnetic_encoder(rate)
        .map_err(|err| device_error("invalid encoder settings", err))?;

    if args.dry_run {
        print_writes(&writes, false, format);
    } else {
        apply_writes(&args.connect, &writes, format)?;
    }
    Ok(SUCCESS)
}

/// Accepts the rate label ("500Hz") or the bare frequency ("500").
fn parse_rate(text: &str) -> CliResult<EncoderSampleRate> {
    let text = text.trim();
    EncoderSampleRate::from_name(text)
        .or_else(|| {
            let hertz: u32 = text.parse().ok()?;
            EncoderSampleRate::ALL
                .iter()
                .copied()
                .find(|rate| rate.hertz() == hertz)
        })
        .ok_or_else(|| {
            let valid: Vec<&str> = EncoderSampleRate::ALL.iter().map(|r| r.name()).collect();
            CliError::usage(format!(
                "invalid sample rate '{text}' (valid: {})",
                valid.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_accepts_label_or_number() {
        assert_eq!(parse_rate("1000Hz").unwrap(), EncoderSampleRate::Rate1000Hz);
        assert_eq!(parse_rate("250").unwrap(), EncoderSampleRate::Rate250Hz);
        assert!(parse_rate("300").is_err());
    }
}
