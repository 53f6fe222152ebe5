//! Shared helpers for command handlers.

use meshprov_core::{Address, Command as CoreCommand, CommandResult, NodeRecord, ProvisionerHandle};

use crate::error::CliError;

/// Wrap a result variant the handler did not ask for.
pub fn unexpected(result: &CommandResult) -> CliError {
    CliError::UnexpectedResult(format!("{result:?}"))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Decode a hex string (optionally `0x`-prefixed, whitespace ignored).
pub fn parse_hex(field: &str, input: &str) -> Result<Vec<u8>, CliError> {
    let digits: String = input.split_whitespace().collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    let invalid = |reason: &str| CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    };
    if digits.len() % 2 != 0 {
        return Err(invalid("odd number of hex digits"));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| invalid("not a hex string"))
        })
        .collect()
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// How a node was named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSelector {
    Uuid(uuid::Uuid),
    Address(Address),
    Name(String),
}

impl NodeSelector {
    /// UUIDs first, then `0x`-prefixed or decimal addresses, else a name.
    pub fn parse(input: &str) -> Self {
        if let Ok(uuid) = input.parse::<uuid::Uuid>() {
            return Self::Uuid(uuid);
        }
        match input.parse::<Address>() {
            Ok(addr) => Self::Address(addr),
            Err(_) => Self::Name(input.into()),
        }
    }
}

/// Look a node up by UUID, any of its element addresses, or name.
pub async fn resolve_node(
    handle: &ProvisionerHandle,
    identifier: &str,
) -> Result<NodeRecord, CliError> {
    let command = match NodeSelector::parse(identifier) {
        NodeSelector::Uuid(uuid) => CoreCommand::GetNodeByUuid { uuid },
        NodeSelector::Address(addr) => CoreCommand::GetNodeByAddress { addr },
        NodeSelector::Name(name) => {
            let index = match handle
                .execute(CoreCommand::GetNodeIndexByName { name })
                .await?
            {
                CommandResult::NodeIndex(index) => index,
                other => return Err(unexpected(&other)),
            };
            let table = match handle.execute(CoreCommand::GetNodeTable).await? {
                CommandResult::NodeTable(table) => table,
                other => return Err(unexpected(&other)),
            };
            return index
                .and_then(|i| table.into_iter().nth(usize::from(i)).flatten())
                .ok_or_else(|| not_found(identifier));
        }
    };
    match handle.execute(command).await? {
        CommandResult::Node(node) => node.map(|n| *n).ok_or_else(|| not_found(identifier)),
        other => Err(unexpected(&other)),
    }
}

fn not_found(identifier: &str) -> CliError {
    CliError::NotFound {
        resource_type: "node".into(),
        identifier: identifier.into(),
        list_command: "node list".into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("data", "0x0a0B ff").unwrap(), vec![0x0A, 0x0B, 0xFF]);
        assert!(parse_hex("data", "abc").is_err());
        assert!(parse_hex("data", "zz").is_err());
        assert_eq!(to_hex(&[0x01, 0xAB]), "01ab");
    }

    #[test]
    fn node_selector_precedence() {
        let uuid = uuid::Uuid::from_u128(7);
        assert_eq!(NodeSelector::parse(&uuid.to_string()), NodeSelector::Uuid(uuid));
        assert_eq!(
            NodeSelector::parse("0x0100"),
            NodeSelector::Address(Address::new(0x0100))
        );
        assert_eq!(NodeSelector::parse("42"), NodeSelector::Address(Address::new(42)));
        assert_eq!(NodeSelector::parse("vent"), NodeSelector::Name("vent".into()));
    }
}
