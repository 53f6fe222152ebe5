//! Settings slot administration.

use tabled::Tabled;

use meshprov_core::{Command as CoreCommand, CommandResult, ProvisionerHandle, SlotInfo};

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "Slot")]
    index: u8,
    #[tabled(rename = "User ID")]
    user_id: String,
    #[tabled(rename = "State")]
    state: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    handle: &ProvisionerHandle,
    args: SettingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SettingsCommand::List => {
            let slots = match handle.execute(CoreCommand::ListSettings).await? {
                CommandResult::Settings(slots) => slots,
                other => return Err(util::unexpected(&other)),
            };
            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output(),
                &slots,
                |s: &SlotInfo| SlotRow {
                    index: s.index,
                    user_id: s.user_id.clone().unwrap_or_else(|| "-".into()),
                    state: output::session_state(s.state, color),
                },
                |s| s.index.to_string(),
            )?;
            output::print_output(&out, global.quiet);

            if let CommandResult::Count(free) =
                handle.execute(CoreCommand::GetFreeSettingsUserIdCount).await?
            {
                output::notice(&format!("{free} slot(s) free for a new user id"), global.quiet);
            }
            Ok(())
        }

        SettingsCommand::Delete { id } => {
            if !util::confirm(&format!("Delete settings {id}?"), global.yes)? {
                return Ok(());
            }
            let slot = match handle.execute(CoreCommand::DeleteSettings(id)).await? {
                CommandResult::Slot(slot) => slot,
                other => return Err(util::unexpected(&other)),
            };
            output::notice(&format!("Settings slot {slot} deleted"), global.quiet);
            Ok(())
        }

        SettingsCommand::EraseAll => {
            if !util::confirm("Erase every settings slot?", global.yes)? {
                return Ok(());
            }
            handle.execute(CoreCommand::EraseAllSettings).await?;
            output::notice("All settings erased", global.quiet);
            Ok(())
        }
    }
}
