use crate::cmd::{resolve, runtime, ReadArgs};
use crate::exit::{device_error, register_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = resolve(&args.register)?;
    let check = if args.timestamped {
        descriptor.ensure_timestamped()
    } else {
        descriptor.ensure_readable()
    };
    check.map_err(|err| register_error("invalid read", err))?;

    let (value, timestamp) = runtime()?.block_on(async {
        let (device, _) = args.connect.connect().await?;
        let result = if args.timestamped {
            device
                .read_value_timestamped(descriptor, None)
                .await
                .map(|stamped| (stamped.value, Some(stamped.seconds)))
        } else {
            device
                .read_value(descriptor, None)
                .await
                .map(|value| (value, None))
        };
        device.close().await;
        result.map_err(|err| device_error("read failed", err))
    })?;

    print_value(descriptor, value, timestamp, format);
    Ok(SUCCESS)
}
