use clap::Args;
use serde_json::json;

use crate::cli::utils::read_json_input;
use crate::cli::OutputFormat;
use crate::signature::canonicalize;

#[derive(Args)]
pub struct CanonicalizeArgs {
    #[arg(help = "JSON document, or - to read stdin")]
    pub input: String,
}

pub async fn handle(args: CanonicalizeArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let value = read_json_input(&args.input)?;
    let canonical = canonicalize(&value);

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "canonical": canonical }))?
        ),
        OutputFormat::Text => println!("{}", canonical),
    }
    Ok(())
}
