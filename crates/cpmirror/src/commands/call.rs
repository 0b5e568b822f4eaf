//! Raw API command passthrough.

use serde_json::Value;
use tracing::{info, warn};

use cpmirror_api::{ApiCommand, ManagementClient};

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    session: &ManagementClient,
    args: CallArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command: ApiCommand = args.command.parse()?;
    let payload: Value = match args.from_file {
        Some(ref path) => util::read_json_file(path)?,
        None => serde_json::from_str(&args.payload)?,
    };
    if !payload.is_object() {
        return Err(CliError::Validation {
            field: "payload".into(),
            reason: "must be a JSON object".into(),
        });
    }

    let reply = session.post(&command, &payload).await?;
    output::print_output(&output::render_value(&global.output, &reply), global.quiet);

    if args.publish {
        if command.is_read_only() {
            warn!(%command, "nothing to publish after a read-only command");
        } else if let Err(e) = session.publish().await {
            warn!(%command, error = %e, "publish failed, discarding session changes");
            if let Err(discard) = session.discard().await {
                warn!(error = %discard, "discard failed");
            }
            return Err(e.into());
        } else {
            info!(%command, "session published");
        }
    }
    Ok(())
}
