use anyhow::bail;
use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::read_json_input;
use crate::cli::OutputFormat;
use crate::signature::{create_signature, TIMESTAMP_FIELD};

#[derive(Args)]
pub struct SignArgs {
    #[arg(long, env = "SIGNATURE_SECRET", help = "Shared signing secret")]
    pub secret: String,

    #[arg(long, help = "Add the current Unix timestamp to the payload before signing")]
    pub timestamp: bool,

    #[arg(help = "JSON payload object, or - to read stdin")]
    pub payload: String,
}

/// Prints the envelope itself so it can be piped into `campus verify` or
/// posted as a request body.
pub async fn handle(args: SignArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut payload = read_json_input(&args.payload)?;
    let Value::Object(fields) = &mut payload else {
        bail!("payload must be a JSON object");
    };

    if args.timestamp {
        fields.insert(
            TIMESTAMP_FIELD.to_string(),
            json!(chrono::Utc::now().timestamp()),
        );
    }

    let signature = create_signature(&payload, &args.secret);
    let envelope = json!({
        "payload": payload,
        "signature": signature
    });

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&envelope)?),
        OutputFormat::Text => println!("{}", envelope),
    }
    Ok(())
}
