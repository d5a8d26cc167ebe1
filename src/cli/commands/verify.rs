use std::collections::HashMap;

use anyhow::anyhow;
use clap::Args;
use serde_json::json;

use crate::cli::utils::{output_error, output_success, read_json_input};
use crate::cli::OutputFormat;
use crate::config::SignatureConfig;
use crate::error::ApiError;
use crate::signature::{SignatureVerifier, SignedEnvelope};

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long, env = "SIGNATURE_SECRET", help = "Shared signing secret")]
    pub secret: String,

    #[arg(long, default_value_t = 300_000, help = "Freshness window in milliseconds")]
    pub window_ms: u64,

    #[arg(long, help = "Fail when the envelope carries no timestamp")]
    pub require_timestamp: bool,

    #[arg(help = "Signed envelope JSON, or - to read stdin")]
    pub envelope: String,
}

pub async fn handle(args: VerifyArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let verifier = SignatureVerifier::from_config(&SignatureConfig {
        secret: args.secret,
        device_secrets: HashMap::new(),
        freshness_window_ms: args.window_ms,
        require_timestamp: args.require_timestamp,
        replay_protection: false,
    });

    let value = read_json_input(&args.envelope)?;
    let result = match SignedEnvelope::from_value(value) {
        Ok(envelope) => verifier.verify_envelope(&envelope, None).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(verified) => output_success(
            &output_format,
            "Signature valid",
            Some(json!({
                "payload": verified.payload,
                "timestamp": verified.timestamp,
            })),
        ),
        Err(e) => {
            let api_error = ApiError::from(e.clone());
            output_error(&output_format, &e.to_string(), Some(api_error.error_code()))?;
            Err(anyhow!("verification failed"))
        }
    }
}
