mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "expander", version, about = "Harp Output Expander CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pwm_subcommand() {
        let cli = Cli::try_parse_from([
            "expander",
            "pwm",
            "--channels",
            "0,2",
            "--frequency",
            "50",
            "--duty-cycle",
            "25",
            "--port",
            "/dev/ttyUSB0",
        ])
        .expect("pwm args should parse");

        match cli.command {
            Command::Pwm(args) => {
                assert_eq!(args.channels, vec![0, 2]);
                assert_eq!(args.connect.port.as_deref(), Some("/dev/ttyUSB0"));
                assert_eq!(args.pulse_count, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn start_conflicts_with_dry_run() {
        let err = Cli::try_parse_from([
            "expander",
            "stim",
            "--on-time",
            "10",
            "--off-time",
            "90",
            "--start",
            "--dry-run",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_read_with_global_format() {
        let cli = Cli::try_parse_from([
            "expander",
            "read",
            "OutputState",
            "--timestamped",
            "--format",
            "json",
            "--timeout",
            "250ms",
        ])
        .expect("read args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        match cli.command {
            Command::Read(args) => {
                assert!(args.timestamped);
                assert_eq!(args.connect.timeout, "250ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
