// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stand-alone host for the PCSX2 integration
//!
//! Drives the integration from the command line the way a game-library host
//! would: list games, print recorded playtime, or launch a game and tick until
//! the emulator exits.

use clap::{Parser, Subcommand};
use log::{error, info};
use ps2_integration::core::config::Settings;
use ps2_integration::core::integration::{Collaborators, Integration};
use ps2_integration::core::notify::{ChannelSink, Notification};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// PCSX2 game-library integration
#[derive(Parser)]
#[command(name = "ps2-integration")]
#[command(about = "PCSX2 library integration host", long_about = None)]
struct Args {
    /// Path to the TOML settings file
    #[arg(short = 'c', long, default_value = "ps2_integration.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the titles found in the ROM directory
    Games,
    /// Print recorded playtime for every title
    Times,
    /// Launch a title and track the session until PCSX2 exits
    Launch {
        /// Title id (ROM file stem)
        id: String,

        /// Seconds between ticks
        #[arg(short = 'i', long, default_value = "1")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (e.g. PS2_INTEGRATION_DATA_DIR, RUST_LOG)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize logger with default level INFO
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("ps2-integration v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let settings = Settings::from_file(&args.config).map_err(|e| {
        error!("Failed to load settings: {}", e);
        e
    })?;

    let (sink, mut notifications) = ChannelSink::new();
    let collaborators = Collaborators::system(&settings, sink);
    let mut integration = Integration::new(
        settings,
        collaborators,
        tokio::runtime::Handle::current(),
        Default::default(),
    )?;

    let games = integration.get_owned_games().await?;

    match args.command {
        Command::Games => {
            for game in &games {
                println!("{}\t{}", game.game_id, game.title);
            }
        }
        Command::Times => {
            let times = integration.prepare_game_times_context().await?;
            for record in times.values() {
                let last = record
                    .last_played
                    .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}s\tlast played: {}",
                    record.title_id, record.total_seconds, last
                );
            }
        }
        Command::Launch { id, interval } => {
            integration.launch_game(&id)?;
            info!("Tracking session for {}", id);

            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            while integration.is_playing() {
                ticker.tick().await;
                let handles = integration.tick();
                if !integration.is_playing() {
                    handles.cycle.await?;
                }
                print_notifications(&mut notifications);
            }

            if let Some(err) = integration.prepare_game_times_context().await.err() {
                error!("Session could not be recorded: {}", err);
                return Err(err.into());
            }
        }
    }

    Ok(())
}

fn print_notifications(rx: &mut UnboundedReceiver<Notification>) {
    while let Ok(notification) = rx.try_recv() {
        match notification {
            Notification::LocalStateChanged(status) => {
                info!("{} is now {:?}", status.title_id, status.state);
            }
            Notification::TimeUpdated(record) => {
                println!("{}\t{}s", record.title_id, record.total_seconds);
            }
        }
    }
}
