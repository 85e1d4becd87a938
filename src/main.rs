use clap::Parser;

use blaze::cli::Args;
use blaze::commands::Workspace;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let workspace = Workspace {
        schema_file: &args.schema,
        migration_dir: &args.migrations,
    };
    let output = args.command.run(&workspace, args.format)?;
    println!("{}", output);
    Ok(())
}
