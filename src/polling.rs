use std::time::Duration;

use teloxide::utils::command::BotCommands;

use crate::commands::Command;
use crate::dispatcher::App;
use crate::gateway::Gateway;

/// Offset of the next update to fetch; `None` until the first update arrives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(Option<i32>);

impl Cursor {
    pub fn offset(self) -> Option<i32> {
        self.0
    }

    /// Moves past `update_id`, never backwards.
    pub fn advance(&mut self, update_id: i32) {
        let next = update_id.saturating_add(1);
        self.0 = Some(self.0.map_or(next, |current| current.max(next)));
    }
}

/// One long-poll cycle: fetch, then handle every update in order.
pub async fn poll_once<G: Gateway>(app: &mut App<G>, cursor: &mut Cursor, timeout: u32) {
    let updates = match app.gateway().fetch_events(cursor.offset(), timeout).await {
        Ok(updates) => updates,
        Err(e) => {
            log::warn!("Fetching updates failed: {e}");
            return;
        }
    };

    for update in updates {
        let id = update.id;
        cursor.advance(id);
        if let Err(e) = app.handle_event(update).await {
            log::error!("Error handling update {id}: {e}");
        }
    }
}

pub async fn run<G: Gateway>(mut app: App<G>) {
    if let Err(e) = app.gateway().register_commands(Command::bot_commands()).await {
        log::warn!("Couldn't register bot commands: {e}");
    }

    let timeout = app.store().config().poll_timeout_secs;
    let interval = Duration::from_secs(app.store().config().poll_interval_secs);
    let mut cursor = Cursor::default();

    log::info!("Polling for updates");
    loop {
        poll_once(&mut app, &mut cursor, timeout).await;
        tokio::time::sleep(interval).await;
    }
}
