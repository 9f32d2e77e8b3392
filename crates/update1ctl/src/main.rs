//! update1ctl - operator client for update1d

mod cli;
mod proxy;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_stream::StreamExt;
use zbus::Connection;

use cli::{Cli, Commands};
use proxy::ManagerProxy;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::system()
        .await
        .context("Failed to connect to the system bus")?;
    let manager = ManagerProxy::new(&conn)
        .await
        .context("Failed to reach com.coreos.update1")?;

    match cli.command {
        Commands::Status { json } => {
            let status = proxy::fetch_status(&manager).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", render::status_block(&status));
            }
        }
        Commands::Reset => {
            manager.reset_status().await.context("ResetStatus failed")?;
            println!("Update status reset");
        }
        Commands::Check => {
            manager.attempt_update().await.context("AttemptUpdate failed")?;
            println!("Update check requested");
        }
        Commands::Watch => {
            let mut updates = manager
                .receive_status_update()
                .await
                .context("Failed to subscribe to StatusUpdate")?;
            while let Some(signal) = updates.next().await {
                match proxy::signal_status(&signal) {
                    Ok(status) => {
                        println!("{}", render::signal_line(&status));
                        if status.needs_reboot() {
                            println!(
                                "Reboot required to finish the update to {}",
                                status.new_version
                            );
                        }
                    }
                    Err(e) => eprintln!("Ignoring malformed StatusUpdate: {:#}", e),
                }
            }
        }
    }

    Ok(())
}
