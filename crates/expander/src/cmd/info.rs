use crate::cmd::{runtime, InfoArgs};
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_info, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let (port, info) = runtime()?.block_on(async {
        let (device, port) = args.connect.connect().await?;
        let info = device.info().await;
        device.close().await;
        info.map(|info| (port, info))
            .map_err(|err| device_error("info failed", err))
    })?;

    print_info(&port, &info, format);
    Ok(SUCCESS)
}
