//! Session summary.

use serde::Serialize;

use meshprov_core::{Command as CoreCommand, CommandResult, FilterType, ProvisionerHandle};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Status {
    slot: Option<u8>,
    session: Option<String>,
    net_keys: usize,
    app_keys: usize,
    bindings: usize,
    nodes: usize,
    heartbeat_receiving: bool,
    filter_type: FilterType,
    filter_entries: usize,
}

fn detail(s: &Status) -> String {
    [
        format!(
            "Session:      {}",
            match (&s.session, s.slot) {
                (Some(id), Some(slot)) => format!("{id} (slot {slot})"),
                _ => "-".into(),
            }
        ),
        format!("NetKeys:      {}", s.net_keys),
        format!("AppKeys:      {}", s.app_keys),
        format!("Bindings:     {}", s.bindings),
        format!("Nodes:        {}", s.nodes),
        format!(
            "Heartbeats:   {}",
            if s.heartbeat_receiving { "receiving" } else { "off" }
        ),
        format!("Filter:       {} ({} entries)", s.filter_type, s.filter_entries),
    ]
    .join("\n")
}

pub async fn handle(handle: &ProvisionerHandle, global: &GlobalOpts) -> Result<(), CliError> {
    let (slot, session) = match handle.execute(CoreCommand::GetActiveSettings).await? {
        CommandResult::Active(active) => active.map_or((None, None), |(slot, id)| {
            (Some(slot), Some(id.to_string()))
        }),
        other => return Err(util::unexpected(&other)),
    };
    let net_keys = match handle.execute(CoreCommand::ListNetKeys).await? {
        CommandResult::NetKeys(keys) => keys.len(),
        other => return Err(util::unexpected(&other)),
    };
    let app_keys = match handle.execute(CoreCommand::ListAppKeys).await? {
        CommandResult::AppKeys(keys) => keys.len(),
        other => return Err(util::unexpected(&other)),
    };
    let bindings = match handle.execute(CoreCommand::ListBindings).await? {
        CommandResult::Bindings(b) => b.len(),
        other => return Err(util::unexpected(&other)),
    };
    let nodes = match handle.execute(CoreCommand::GetNodeCount).await? {
        CommandResult::Count(n) => n,
        other => return Err(util::unexpected(&other)),
    };
    let (filter_type, heartbeat_receiving, filter_entries) =
        match handle.execute(CoreCommand::ListHeartbeatFilter).await? {
            CommandResult::FilterEntries {
                filter_type,
                receiving,
                entries,
            } => (filter_type, receiving, entries.len()),
            other => return Err(util::unexpected(&other)),
        };

    let status = Status {
        slot,
        session,
        net_keys,
        app_keys,
        bindings,
        nodes,
        heartbeat_receiving,
        filter_type,
        filter_entries,
    };
    let out = output::render_single(global.output(), &status, detail, |s| {
        s.slot.map(|slot| slot.to_string()).unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
