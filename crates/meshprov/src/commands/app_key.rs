//! AppKey and local binding command handlers.

use serde::Serialize;
use tabled::Tabled;

use meshprov_core::{
    AppKeyBinding, Command as CoreCommand, CommandResult, IndexRequest, KeyIndex,
    ProvisionerHandle,
};

use crate::cli::{AppKeyArgs, AppKeyCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Output shapes ───────────────────────────────────────────────────

#[derive(Serialize)]
struct AppKeyOut {
    app_index: KeyIndex,
    net_index: KeyIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

#[derive(Tabled)]
struct AppKeyRow {
    #[tabled(rename = "AppKey Index")]
    app_index: String,
    #[tabled(rename = "NetKey Index")]
    net_index: String,
}

#[derive(Tabled)]
struct BindingRow {
    #[tabled(rename = "Element")]
    element: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "AppKey Index")]
    app_index: String,
}

impl From<&AppKeyBinding> for BindingRow {
    fn from(b: &AppKeyBinding) -> Self {
        Self {
            element: b.element.to_string(),
            model: b.model.to_string(),
            app_index: b.app_index.to_string(),
        }
    }
}

fn detail(k: &AppKeyOut) -> String {
    let mut line = format!("{} (NetKey {})", k.app_index, k.net_index);
    if let Some(key) = &k.key {
        line.push_str("  ");
        line.push_str(key);
    }
    line
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    handle: &ProvisionerHandle,
    args: AppKeyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AppKeyCommand::Add { net, index, key } => {
            let app_index = match handle
                .execute(CoreCommand::AddAppKey {
                    value: key,
                    net_index: net,
                    app_index: index.map_or(IndexRequest::Generate, IndexRequest::Exact),
                })
                .await?
            {
                CommandResult::KeyIndex(i) => i,
                other => return Err(util::unexpected(&other)),
            };
            let out = AppKeyOut {
                app_index,
                net_index: net,
                key: None,
            };
            let rendered =
                output::render_single(global.output(), &out, detail, |k| k.app_index.to_string())?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        AppKeyCommand::Update { net, app, key } => {
            handle
                .execute(CoreCommand::UpdateAppKey {
                    value: key,
                    net_index: net,
                    app_index: app,
                })
                .await?;
            output::notice(&format!("AppKey {app} updated"), global.quiet);
            Ok(())
        }

        AppKeyCommand::Get { net, app } => {
            let key = match handle
                .execute(CoreCommand::GetAppKey {
                    net_index: net,
                    app_index: app,
                })
                .await?
            {
                CommandResult::Key(k) => k,
                other => return Err(util::unexpected(&other)),
            };
            let out = AppKeyOut {
                app_index: app,
                net_index: net,
                key: Some(key.to_hex()),
            };
            let rendered = output::render_single(global.output(), &out, detail, |k| {
                k.key.clone().unwrap_or_default()
            })?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        AppKeyCommand::List => {
            let keys: Vec<AppKeyOut> = match handle.execute(CoreCommand::ListAppKeys).await? {
                CommandResult::AppKeys(pairs) => pairs
                    .into_iter()
                    .map(|(app_index, net_index)| AppKeyOut {
                        app_index,
                        net_index,
                        key: None,
                    })
                    .collect(),
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output(),
                &keys,
                |k| AppKeyRow {
                    app_index: k.app_index.to_string(),
                    net_index: k.net_index.to_string(),
                },
                |k| k.app_index.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AppKeyCommand::Bind {
            element,
            app,
            model,
        } => {
            handle
                .execute(CoreCommand::BindAppKey {
                    element,
                    app_index: app,
                    model,
                })
                .await?;
            output::notice(
                &format!("AppKey {app} bound to model {model} on {element}"),
                global.quiet,
            );
            Ok(())
        }

        AppKeyCommand::Bindings => {
            let bindings = match handle.execute(CoreCommand::ListBindings).await? {
                CommandResult::Bindings(b) => b,
                other => return Err(util::unexpected(&other)),
            };
            let out = output::render_list(
                global.output(),
                &bindings,
                |b| BindingRow::from(b),
                |b| format!("{} {} {}", b.element, b.model, b.app_index),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
