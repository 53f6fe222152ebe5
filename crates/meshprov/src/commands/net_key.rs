//! NetKey command handlers.

use serde::Serialize;
use tabled::Tabled;

use meshprov_core::{
    Command as CoreCommand, CommandResult, IndexRequest, KeyIndex, ProvisionerHandle,
};

use crate::cli::{GlobalOpts, NetKeyArgs, NetKeyCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct NetKeyOut {
    net_index: KeyIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

#[derive(Tabled)]
struct NetKeyRow {
    #[tabled(rename = "NetKey Index")]
    index: String,
}

fn detail(k: &NetKeyOut) -> String {
    match &k.key {
        Some(key) => format!("{}  {key}", k.net_index),
        None => k.net_index.to_string(),
    }
}

pub async fn handle(
    handle: &ProvisionerHandle,
    args: NetKeyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NetKeyCommand::Add { index, key } => {
            let request = index.map_or(IndexRequest::Generate, IndexRequest::Exact);
            let net_index = match handle
                .execute(CoreCommand::AddNetKey {
                    value: key,
                    index: request,
                })
                .await?
            {
                CommandResult::KeyIndex(i) => i,
                other => return Err(util::unexpected(&other)),
            };
            let out = NetKeyOut {
                net_index,
                key: None,
            };
            let rendered =
                output::render_single(global.output(), &out, detail, |k| k.net_index.to_string())?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        NetKeyCommand::Update { index, key } => {
            handle
                .execute(CoreCommand::UpdateNetKey { value: key, index })
                .await?;
            output::notice(&format!("NetKey {index} updated"), global.quiet);
            Ok(())
        }

        NetKeyCommand::Get { index } => {
            let key = match handle.execute(CoreCommand::GetNetKey { index }).await? {
                CommandResult::Key(k) => k,
                other => return Err(util::unexpected(&other)),
            };
            let out = NetKeyOut {
                net_index: index,
                key: Some(key.to_hex()),
            };
            let rendered = output::render_single(global.output(), &out, detail, |k| {
                k.key.clone().unwrap_or_default()
            })?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        NetKeyCommand::List => {
            let indexes = match handle.execute(CoreCommand::ListNetKeys).await? {
                CommandResult::NetKeys(i) => i,
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output(),
                &indexes,
                |i| NetKeyRow {
                    index: i.to_string(),
                },
                ToString::to_string,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
