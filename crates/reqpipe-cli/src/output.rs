use reqpipe_core::ApiEnvelope;

use crate::error::CliError;

/// Print the envelope as JSON on stdout.
pub fn render(envelope: &ApiEnvelope, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    println!("{rendered}");
    Ok(())
}
