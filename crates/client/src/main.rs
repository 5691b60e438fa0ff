//! Command line entry point.
//!
//! ```text
//! stockroom [dashboard]      print dashboard metrics as JSON
//! stockroom list [search]    print the merged item list
//! stockroom delete <id>      delete one record (Ctrl-C during the grace period undoes it)
//! stockroom delete-all <id>  delete every record grouped with <id>
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use stockroom_client::{ClientConfig, DeleteMode, HttpStore, Session};
use stockroom_core::ItemId;
use stockroom_inventory::{ListQuery, display_name};
use stockroom_observability::LogFormat;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    match std::env::var("STOCKROOM_LOG_FORMAT") {
        Ok(raw) => {
            let format = raw.parse().unwrap_or_else(|err| {
                eprintln!("{err}, using json");
                LogFormat::Json
            });
            stockroom_observability::tracing::init(format);
        }
        Err(_) => stockroom_observability::init(),
    }

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let store = HttpStore::new(&config).context("failed to build HTTP client")?;
    tracing::info!(api_url = %config.api_url, "using item store");

    let mut session = Session::new(Arc::new(store), config);
    session.refresh()?;
    session.wait_for_requests().await;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str).unwrap_or("dashboard") {
        "dashboard" => {
            let dashboard = session.dashboard();
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
        "list" => {
            let query = ListQuery {
                search: args.get(1).cloned().unwrap_or_default(),
                ..ListQuery::default()
            };
            session.set_query(query)?;
            for item in session.grouped() {
                println!(
                    "{:<24} {:<16} qty {:>8} price {:>10.2}  [{}]",
                    display_name(&item.name),
                    item.category_label(),
                    item.quantity,
                    item.price,
                    item.id
                );
            }
        }
        "delete" => {
            let Some(id) = args.get(1) else {
                bail!("usage: stockroom delete <id>");
            };
            let grace = session.config().undo_grace;
            session.delete(&ItemId::new(id.as_str()), DeleteMode::Single)?;
            println!("deleting {id} in {} ms, press Ctrl-C to undo", grace.as_millis());

            tokio::select! {
                _ = session.settle() => println!("deleted {id}"),
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl-C")?;
                    session.undo()?;
                    println!("undone, {id} kept");
                }
            }
        }
        "delete-all" => {
            let Some(id) = args.get(1) else {
                bail!("usage: stockroom delete-all <id>");
            };
            session.delete(&ItemId::new(id.as_str()), DeleteMode::Group)?;
            session.wait_for_requests().await;
            for notice in session.state().notices() {
                println!("{}", notice.message);
            }
        }
        other => bail!("unknown command '{other}'"),
    }

    Ok(())
}
