use expander_registers::RegisterMap;

use crate::cmd::RegistersArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_registers, OutputFormat};

pub fn run(args: RegistersArgs, format: OutputFormat) -> CliResult<i32> {
    let needle = args.filter.map(|f| f.to_ascii_lowercase());
    let matches = RegisterMap::output_expander().iter().filter(|descriptor| {
        needle
            .as_deref()
            .map_or(true, |n| descriptor.name.to_ascii_lowercase().contains(n))
    });
    print_registers(matches, format);
    Ok(SUCCESS)
}
