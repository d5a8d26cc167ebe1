use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::policy::{PolicyRule, PolicyTable};

#[derive(Subcommand)]
pub enum PolicyCommands {
    #[command(about = "Validate a policy table and list its rules")]
    Check {
        #[arg(long, env = "GATEWAY_POLICY_FILE", help = "Policy YAML file (defaults to the built-in table)")]
        file: Option<String>,
    },
}

pub async fn handle(cmd: PolicyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Check { file } => {
            let table = match PolicyTable::load(file.as_deref()) {
                Ok(table) => table,
                Err(e) => {
                    output_error(&output_format, &e.to_string(), Some("INVALID_POLICY"))?;
                    return Err(e.into());
                }
            };

            match output_format {
                OutputFormat::Json => {
                    let rules: Vec<Value> = table.rules().iter().map(rule_json).collect();
                    output_success(
                        &output_format,
                        &format!("{} rules valid", table.len()),
                        Some(json!({ "rules": rules })),
                    )?;
                }
                OutputFormat::Text => {
                    for rule in table.rules() {
                        println!("{}", rule_line(rule));
                    }
                    output_success(&output_format, &format!("{} rules valid", table.len()), None)?;
                }
            }
            Ok(())
        }
    }
}

fn rule_json(rule: &PolicyRule) -> Value {
    json!({
        "name": rule.name,
        "method": rule.method.to_string(),
        "route": rule.route,
        "public": rule.public,
        "signed": rule.signed,
        "allowed_roles": rule.allowed_roles,
        "required_scopes": rule.required_scopes,
        "accept": rule.accept,
        "tenant_isolation": rule.tenant_isolation,
        "rate_limit": rule.rate_limit.as_ref().map(|limit| json!({
            "limit": limit.limit,
            "window_ms": limit.window.as_millis() as u64,
            "class": limit.class,
        })),
    })
}

fn rule_line(rule: &PolicyRule) -> String {
    let mut flags = Vec::new();
    if rule.public {
        flags.push("public".to_string());
    }
    if rule.signed {
        flags.push("signed".to_string());
    }
    if rule.tenant_isolation {
        flags.push("tenant".to_string());
    }
    if !rule.allowed_roles.is_empty() {
        let roles: Vec<&str> = rule.allowed_roles.iter().map(|r| r.as_str()).collect();
        flags.push(format!("roles={}", roles.join(",")));
    }
    if !rule.required_scopes.is_empty() {
        let scopes: Vec<&str> = rule.required_scopes.iter().map(String::as_str).collect();
        flags.push(format!("scopes={}", scopes.join(",")));
    }
    if let Some(limit) = &rule.rate_limit {
        flags.push(format!("limit={}/{}s", limit.limit, limit.window.as_secs()));
    }

    format!("{:<7} {:<40} {:<18} {}", rule.method.to_string(), rule.route, rule.name, flags.join(" "))
}
