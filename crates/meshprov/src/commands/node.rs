//! Node registry command handlers.

use serde::Serialize;
use tabled::Tabled;

use meshprov_core::{
    Address, Command as CoreCommand, CommandResult, KeyIndex, KeyValue, NewNode, NodeRecord,
    ProvisionerHandle,
};

use crate::cli::{GlobalOpts, NodeArgs, NodeCommand};
use crate::error::CliError;
use crate::output;

use super::util::{self, NodeSelector};

// ── Output shapes ───────────────────────────────────────────────────

#[derive(Serialize)]
struct NodeOut {
    index: u16,
    uuid: uuid::Uuid,
    unicast: Address,
    element_count: u8,
    net_index: KeyIndex,
    name: Option<String>,
    composition_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_key: Option<String>,
}

impl NodeOut {
    fn new(n: &NodeRecord, with_device_key: bool) -> Self {
        Self {
            index: n.index,
            uuid: n.uuid,
            unicast: n.unicast,
            element_count: n.element_count,
            net_index: n.net_index,
            name: n.name.clone(),
            composition_data: n.composition_data.as_deref().map(util::to_hex),
            device_key: with_device_key.then(|| n.device_key.to_hex()),
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Index")]
    index: u16,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Unicast")]
    unicast: String,
    #[tabled(rename = "Elements")]
    elements: u8,
    #[tabled(rename = "NetKey")]
    net_index: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Comp Data")]
    comp_data: String,
}

impl From<&NodeOut> for NodeRow {
    fn from(n: &NodeOut) -> Self {
        Self {
            index: n.index,
            uuid: n.uuid.to_string(),
            unicast: n.unicast.to_string(),
            elements: n.element_count,
            net_index: n.net_index.to_string(),
            name: n.name.clone().unwrap_or_default(),
            comp_data: n
                .composition_data
                .as_ref()
                .map_or_else(|| "-".into(), |hex| format!("{} bytes", hex.len() / 2)),
        }
    }
}

fn detail(n: &NodeOut) -> String {
    let mut lines = vec![
        format!("Index:      {}", n.index),
        format!("UUID:       {}", n.uuid),
        format!("Name:       {}", n.name.as_deref().unwrap_or("-")),
        format!("Unicast:    {}", n.unicast),
        format!("Elements:   {}", n.element_count),
        format!("NetKey:     {}", n.net_index),
    ];
    if let Some(key) = &n.device_key {
        lines.push(format!("Device key: {key}"));
    }
    lines.push(format!(
        "Comp data:  {}",
        n.composition_data.as_deref().unwrap_or("-")
    ));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    handle: &ProvisionerHandle,
    args: NodeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        NodeCommand::Add {
            unicast,
            elements,
            net,
            uuid,
            device_key,
            name,
        } => {
            let node = NewNode {
                uuid: uuid.unwrap_or_else(uuid::Uuid::new_v4),
                unicast,
                element_count: elements,
                net_index: net,
                device_key: device_key.unwrap_or_else(KeyValue::generate),
            };
            let index = match handle
                .execute(CoreCommand::ProvisioningComplete(node))
                .await?
            {
                CommandResult::NodeIndex(Some(index)) => index,
                other => return Err(util::unexpected(&other)),
            };
            if let Some(name) = name {
                handle
                    .execute(CoreCommand::SetNodeName { index, name })
                    .await?;
            }
            output::print_output(&index.to_string(), global.quiet);
            Ok(())
        }

        NodeCommand::List => {
            let nodes: Vec<NodeOut> = match handle.execute(CoreCommand::GetNodeTable).await? {
                CommandResult::NodeTable(table) => table
                    .iter()
                    .flatten()
                    .map(|n| NodeOut::new(n, false))
                    .collect(),
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output(),
                &nodes,
                |n| NodeRow::from(n),
                |n| n.uuid.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NodeCommand::Show { node } => {
            let record = util::resolve_node(handle, &node).await?;
            let out = NodeOut::new(&record, true);
            let rendered =
                output::render_single(global.output(), &out, detail, |n| n.uuid.to_string())?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        NodeCommand::Rename { index, name } => {
            handle
                .execute(CoreCommand::SetNodeName {
                    index,
                    name: name.clone(),
                })
                .await?;
            output::notice(&format!("Node {index} renamed to '{name}'"), global.quiet);
            Ok(())
        }

        NodeCommand::Delete { node } => {
            let command = match NodeSelector::parse(&node) {
                NodeSelector::Uuid(uuid) => CoreCommand::DeleteNodeByUuid { uuid },
                NodeSelector::Address(addr) => CoreCommand::DeleteNodeByAddress { addr },
                NodeSelector::Name(_) => {
                    let record = util::resolve_node(handle, &node).await?;
                    CoreCommand::DeleteNodeByUuid { uuid: record.uuid }
                }
            };
            if !util::confirm(&format!("Delete node {node}?"), global.yes)? {
                return Ok(());
            }
            let removed = match handle.execute(command).await? {
                CommandResult::Node(Some(n)) => n,
                other => return Err(util::unexpected(&other)),
            };
            output::notice(
                &format!("Node {} ({}) deleted", removed.index, removed.uuid),
                global.quiet,
            );
            Ok(())
        }

        NodeCommand::CompData { address, data } => {
            let bytes = util::parse_hex("composition data", &data)?;
            let len = bytes.len();
            handle
                .execute(CoreCommand::StoreCompositionData {
                    addr: address,
                    data: bytes,
                })
                .await?;
            output::notice(
                &format!("Stored {len} bytes of composition data for {address}"),
                global.quiet,
            );
            Ok(())
        }
    }
}
