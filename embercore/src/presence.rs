//! Presence refresh: poll the directory for every pinned friend,
//! update presence, and raise online/offline/key-conflict transitions.

use chrono::{Duration, Utc};
use tracing::warn;

use crate::error::NodeError;
use crate::event::Event;
use crate::keystate::{FriendKeyState, classify};
use crate::node::Node;

/// A friend is considered online if last seen within this window.
const ONLINE_WINDOW: Duration = Duration::minutes(5);

impl Node {
    pub async fn refresh_presence(&self) -> Result<(), NodeError> {
        let friends = self.store.list_friends().await?;

        for friend in friends {
            let record = match self.directory.lookup(&friend.username).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(peer = %friend.username, error = %e, "presence lookup failed");
                    continue;
                }
            };

            let was_online = is_recent(friend.last_seen);
            let state = classify(&friend, &record);

            match state {
                FriendKeyState::KeyChanged => {
                    let mut conflicts = self.key_conflicts.lock().await;
                    if conflicts.insert(friend.username.clone()) {
                        drop(conflicts);
                        self.events
                        .publish(Event::FriendKeyConflict {
                                username: friend.username.clone(),
                        })
                        .await;
                    }
                    continue;
                }
                FriendKeyState::PinnedCurrent | FriendKeyState::PinnedStalePresence => {
                    if let (Some(ip), Some(seen)) = (record.last_ip.clone(), record.last_seen) {
                        self.store.update_presence(&friend.username, &ip, seen).await?;
                    }
                }
            }

            let now_online = is_recent(record.last_seen);
            if now_online && !was_online {
                self.events
                .publish(Event::FriendOnline {
                        username: friend.username.clone(),
                })
                .await;
            } else if !now_online && was_online {
                self.events
                .publish(Event::FriendOffline {
                        username: friend.username.clone(),
                })
                .await;
            }
        }
        Ok(())
    }
}

fn is_recent(last_seen: Option<chrono::DateTime<Utc>>) -> bool {
    match last_seen {
        Some(t) => Utc::now() - t <= ONLINE_WINDOW,
        None => false,
    }
}
