//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod app_key;
pub mod config_cmd;
pub mod heartbeat;
pub mod net_key;
pub mod node;
pub mod settings;
pub mod status;
pub mod util;

use meshprov_core::ProvisionerHandle;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    handle: &ProvisionerHandle,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(handle, global).await,
        Command::NetKey(args) => net_key::handle(handle, args, global).await,
        Command::AppKey(args) => app_key::handle(handle, args, global).await,
        Command::Node(args) => node::handle(handle, args, global).await,
        Command::Heartbeat(args) => heartbeat::handle(handle, args, global).await,
        // Settings, Config and Completions are handled before dispatch
        Command::Settings(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
