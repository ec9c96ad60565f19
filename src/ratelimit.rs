// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Request throttling keyed by caller, stored in the shared database so every
//! process using it sees the same counters.
//!
//! Each key gets a fixed window of `max_requests` calls and must wait
//! `min_interval_seconds` between calls. Entries idle for longer than
//! `ttl_seconds` are swept, and the table never holds more than `capacity`
//! keys: the least recently seen ones are evicted first.

use crate::config::RateLimitSettings;
use crate::db::begin_write;
use crate::error::Result;
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    TooSoon { retry_after: i64 },
    WindowExhausted { retry_after: i64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self { settings }
    }

    /// Record an attempt by `key` at unix time `now` and decide whether it may proceed.
    pub fn check(&self, conn: &mut Connection, key: &str, now: i64) -> Result<Decision> {
        let s = &self.settings;
        let tx = begin_write(conn)?;
        let row: Option<(i64, u32, i64)> = tx
            .query_row(
                "SELECT window_start, count, last_seen FROM rate_limits WHERE key=?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let decision = match row {
            Some((_, _, last_seen)) if now - last_seen < s.min_interval_seconds => {
                Decision::TooSoon {
                    retry_after: s.min_interval_seconds - (now - last_seen),
                }
            }
            Some((start, count, _)) if now - start < s.window_seconds => {
                if count >= s.max_requests {
                    Decision::WindowExhausted {
                        retry_after: s.window_seconds - (now - start),
                    }
                } else {
                    tx.execute(
                        "UPDATE rate_limits SET count=count+1, last_seen=?1 WHERE key=?2",
                        params![now, key],
                    )?;
                    Decision::Allowed {
                        remaining: s.max_requests - count - 1,
                    }
                }
            }
            _ => {
                tx.execute(
                    "INSERT INTO rate_limits(key, window_start, count, last_seen) VALUES (?1,?2,1,?2)
                     ON CONFLICT(key) DO UPDATE SET window_start=?2, count=1, last_seen=?2",
                    params![key, now],
                )?;
                Decision::Allowed {
                    remaining: s.max_requests - 1,
                }
            }
        };
        if row.is_none() {
            self.evict_over_capacity(&tx)?;
        }
        tx.commit()?;

        match decision {
            Decision::Allowed { remaining } => debug!("rate limit {key}: allowed, {remaining} left"),
            other => warn!("rate limit {key}: {:?}", other),
        }
        Ok(decision)
    }

    /// Drop keys idle for longer than the TTL. Returns how many were removed.
    pub fn sweep(&self, conn: &Connection, now: i64) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM rate_limits WHERE last_seen < ?1",
            params![now - self.settings.ttl_seconds],
        )?;
        if removed > 0 {
            debug!("rate limit sweep removed {removed} idle keys");
        }
        Ok(removed)
    }

    fn evict_over_capacity(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rate_limits", [], |r| r.get(0))?;
        let excess = count - i64::from(self.settings.capacity);
        if excess > 0 {
            conn.execute(
                "DELETE FROM rate_limits WHERE key IN
                 (SELECT key FROM rate_limits ORDER BY last_seen ASC, key ASC LIMIT ?1)",
                params![excess],
            )?;
        }
        Ok(())
    }
}
