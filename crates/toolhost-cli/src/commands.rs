use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::{IsTerminal, Write};
use tokio::io::AsyncReadExt;
use toolhost_core::{
    DispatchOutput, Dispatcher, Reclaimer, ToolRegistry, ToolhostConfig, ToolhostError,
};
use tracing::{error, info};

pub async fn list(config: &ToolhostConfig) -> Result<()> {
    let snapshot = ToolRegistry::new(config).discover().await?;
    let json = serde_json::to_string(&snapshot)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{json}")?;
    out.flush()?;
    Ok(())
}

pub async fn update(config: &ToolhostConfig) -> Result<()> {
    info!("--- Running full update and cleanup ---");
    let dispatcher = Dispatcher::new(config);
    let snapshot = dispatcher.registry().discover().await?;

    Reclaimer::new(config).reclaim(&snapshot.names()).await;

    let mut failed = Vec::new();
    for tool in snapshot.iter().filter(|t| !t.dependencies().is_empty()) {
        if let Err(e) = dispatcher.provisioner().provision(&tool.name, tool.dependencies()).await {
            error!(tool = %tool.name, "{}", e);
            failed.push(tool.name.as_str());
        }
    }

    if !failed.is_empty() {
        bail!("provisioning failed for: {}", failed.join(", "));
    }
    info!("Update and cleanup complete");
    Ok(())
}

pub async fn run(config: &ToolhostConfig, name: &str, extra: &[String]) -> Result<()> {
    if !extra.is_empty() {
        return Err(ToolhostError::Input(format!(
            "unexpected arguments {extra:?}; the payload is read from stdin"
        ))
        .into());
    }

    let payload = read_payload().await?;
    let output = Dispatcher::new(config).run(name, &payload).await?;

    relay(&output)?;
    output.into_result()?;
    Ok(())
}

/// Child stderr always goes to stderr. Child stdout goes to stdout only on
/// success, so stdout never carries anything but a tool result.
fn relay(output: &DispatchOutput) -> std::io::Result<()> {
    let mut err = std::io::stderr().lock();
    if output.success() {
        let mut out = std::io::stdout().lock();
        out.write_all(&output.stdout)?;
        out.flush()?;
    } else {
        err.write_all(&output.stdout)?;
    }
    err.write_all(&output.stderr)?;
    err.flush()
}

/// The whole of stdin as one JSON document. Nothing to read means `{}`.
async fn read_payload() -> Result<Value> {
    if std::io::stdin().is_terminal() {
        return Ok(Value::Object(Default::default()));
    }

    let mut raw = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut raw)
        .await
        .context("failed to read stdin")?;
    Ok(parse_payload(&raw)?)
}

fn parse_payload(raw: &[u8]) -> Result<Value, ToolhostError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(raw).map_err(|e| ToolhostError::Input(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_input_is_an_empty_object() {
        assert_eq!(parse_payload(b"").unwrap(), json!({}));
        assert_eq!(parse_payload(b" \n\t").unwrap(), json!({}));
    }

    #[test]
    fn batch_payload_parses() {
        let v = parse_payload(br#"{"@items":[{"text":"a"},{"text":"b"}]}"#).unwrap();
        assert_eq!(v["@items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let err = parse_payload(b"{not json").unwrap_err();
        assert!(matches!(err, ToolhostError::Input(_)));
    }
}
