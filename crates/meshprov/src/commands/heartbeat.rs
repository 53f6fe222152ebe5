//! Heartbeat reception and filter handlers.

use serde::Serialize;
use tabled::Tabled;

use meshprov_core::{
    Address, Command as CoreCommand, CommandResult, FilterInfo, FilterOp, FilterType, Heartbeat,
    HeartbeatFilterEntry, ProvisionerHandle,
};

use crate::cli::{GlobalOpts, HeartbeatArgs, HeartbeatCommand, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Output shapes ───────────────────────────────────────────────────

#[derive(Serialize)]
struct FilterOut {
    receiving: bool,
    filter_type: FilterType,
    entries: Vec<HeartbeatFilterEntry>,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Source")]
    src: String,
    #[tabled(rename = "Destination")]
    dst: String,
    #[tabled(rename = "Expiry")]
    expiry: String,
    #[tabled(rename = "Remaining")]
    remaining: String,
}

fn addr_or_any(addr: Option<Address>) -> String {
    addr.map_or_else(|| "*".into(), |a| a.to_string())
}

impl From<&HeartbeatFilterEntry> for EntryRow {
    fn from(e: &HeartbeatFilterEntry) -> Self {
        Self {
            src: addr_or_any(e.src),
            dst: addr_or_any(e.dst),
            expiry: e
                .expiry
                .map_or_else(|| "never".into(), |d| format!("{}s", d.as_secs())),
            remaining: e
                .remaining
                .map_or_else(|| "-".into(), |d| format!("{}s", d.as_secs())),
        }
    }
}

#[derive(Serialize)]
struct Verdict {
    src: Address,
    dst: Address,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hops: Option<u8>,
}

fn filter_info(src: Option<Address>, dst: Option<Address>, expiry: u32) -> FilterInfo {
    FilterInfo {
        src,
        dst,
        expiry_secs: expiry,
    }
}

async fn set_filter(
    handle: &ProvisionerHandle,
    op: FilterOp,
    info: FilterInfo,
) -> Result<(), CliError> {
    handle
        .execute(CoreCommand::SetHeartbeatFilterInfo { op, info })
        .await?;
    Ok(())
}

fn print_verdict(v: &Verdict, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let rendered = output::render_single(
        global.output(),
        v,
        |v| {
            let verdict = output::verdict(v.passed, color);
            match v.hops {
                Some(hops) => format!("{} -> {}: {verdict} ({hops} hops)", v.src, v.dst),
                None => format!("{} -> {}: {verdict}", v.src, v.dst),
            }
        },
        |v| v.passed.to_string(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    handle: &ProvisionerHandle,
    args: HeartbeatArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        HeartbeatCommand::Start => {
            handle.execute(CoreCommand::StartHeartbeatReceiving).await?;
            output::notice(
                "Heartbeat receiving started (filter reset to blacklist)",
                global.quiet,
            );
            Ok(())
        }

        HeartbeatCommand::Stop => {
            handle.execute(CoreCommand::StopHeartbeatReceiving).await?;
            output::notice("Heartbeat receiving stopped", global.quiet);
            Ok(())
        }

        HeartbeatCommand::FilterType { filter_type } => {
            handle
                .execute(CoreCommand::SetHeartbeatFilterType(filter_type))
                .await?;
            output::notice(
                &format!("Heartbeat filter is now a {filter_type}"),
                global.quiet,
            );
            Ok(())
        }

        HeartbeatCommand::Add { src, dst, expiry } => {
            set_filter(handle, FilterOp::Add, filter_info(src, dst, expiry)).await?;
            output::notice(
                &format!("Filter entry {} -> {} added", addr_or_any(src), addr_or_any(dst)),
                global.quiet,
            );
            Ok(())
        }

        HeartbeatCommand::Remove { src, dst } => {
            set_filter(handle, FilterOp::Remove, filter_info(src, dst, 0)).await?;
            output::notice("Matching filter entries removed", global.quiet);
            Ok(())
        }

        HeartbeatCommand::Clean => {
            set_filter(handle, FilterOp::Clean, FilterInfo::default()).await?;
            output::notice("Filter entries cleared", global.quiet);
            Ok(())
        }

        HeartbeatCommand::List => {
            let filter = match handle.execute(CoreCommand::ListHeartbeatFilter).await? {
                CommandResult::FilterEntries {
                    filter_type,
                    receiving,
                    entries,
                } => FilterOut {
                    receiving,
                    filter_type,
                    entries,
                },
                other => return Err(util::unexpected(&other)),
            };
            let rendered = match global.output() {
                OutputFormat::Table => {
                    output::notice(
                        &format!(
                            "{} ({})",
                            filter.filter_type,
                            if filter.receiving { "receiving" } else { "not receiving" }
                        ),
                        global.quiet,
                    );
                    output::render_list(
                        global.output(),
                        &filter.entries,
                        |e| EntryRow::from(e),
                        |_| String::new(),
                    )?
                }
                OutputFormat::Plain => filter
                    .entries
                    .iter()
                    .map(|e| format!("{} {}", addr_or_any(e.src), addr_or_any(e.dst)))
                    .collect::<Vec<_>>()
                    .join("\n"),
                format => {
                    output::render_single(format, &filter, |_| String::new(), |_| String::new())?
                }
            };
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        HeartbeatCommand::Check { src, dst } => {
            let passed = match handle
                .execute(CoreCommand::EvaluateHeartbeat { src, dst })
                .await?
            {
                CommandResult::Passed(p) => p,
                other => return Err(util::unexpected(&other)),
            };
            print_verdict(
                &Verdict {
                    src,
                    dst,
                    passed,
                    hops: None,
                },
                global,
            )
        }

        HeartbeatCommand::Inject {
            src,
            dst,
            init_ttl,
            rx_ttl,
            features,
            rssi,
        } => {
            let heartbeat = Heartbeat {
                src,
                dst,
                init_ttl,
                rx_ttl,
                features,
                rssi,
            };
            let passed = match handle.execute(CoreCommand::Heartbeat(heartbeat)).await? {
                CommandResult::Passed(p) => p,
                other => return Err(util::unexpected(&other)),
            };
            print_verdict(
                &Verdict {
                    src,
                    dst,
                    passed,
                    hops: passed.then(|| heartbeat.hops()),
                },
                global,
            )
        }
    }
}
