//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod call;
pub mod config_cmd;
pub mod inventory;
pub mod objects;
pub mod rules;
pub mod status;
pub mod sync;
pub mod util;

use cpmirror_core::MirrorConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Log in, run a server-bound command, and log out again.
pub async fn dispatch(
    cmd: Command,
    mirror: &MirrorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = cpmirror_core::connect(mirror).await?;

    let result = match cmd {
        Command::Sync(args) => sync::handle(&session, mirror, args, global).await,
        Command::Status => status::handle(&session, mirror, global).await,
        Command::Rules(args) => rules::handle(&session, args, global).await,
        Command::Objects(args) => objects::handle_remote(&session, args, global).await,
        Command::Targets => inventory::targets(&session, mirror, global).await,
        Command::Layers => inventory::layers(&session, mirror, global).await,
        Command::Commands => inventory::commands(&session, global).await,
        Command::Call(args) => call::handle(&session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };

    cpmirror_core::disconnect(&session).await;
    result
}
