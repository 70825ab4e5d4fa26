use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("expander {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: expander");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("EXPANDER_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("EXPANDER_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("features: serial={}, cli=true", cfg!(feature = "serial"));
    println!(
        "device: WhoAmI {}, {} registers",
        expander_registers::EXPECTED_WHO_AM_I,
        expander_registers::RegisterMap::output_expander().len()
    );

    Ok(SUCCESS)
}
