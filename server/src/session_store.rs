//! Session storage for phone-to-client motion pairing
//!
//! This module owns the server-side table of motion sessions, including:
//! - Token allocation and capacity limits on creation
//! - Per-session smoothing state and update throttling
//! - Expiry sweeps and least-recently-updated eviction
//! - Counters reported by the health endpoint
//!
//! All operations take the current time in milliseconds as an argument, so the
//! store itself never reads a clock.

use crate::error::{BridgeError, Result};
use crate::token::TokenGenerator;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::{is_expired, MotionFilter, MotionSample, SmoothingConfig};
use std::collections::HashMap;

/// Limits and tuning for the session table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of live sessions; `create` is rejected beyond this
    pub max_sessions: usize,
    /// Token draws attempted before giving up on a collision streak
    pub max_token_attempts: usize,
    /// Updates arriving sooner than this after the last accepted one are dropped
    pub debounce_ms: u64,
    /// Idle time after which a session no longer counts toward capacity
    pub session_ttl_ms: u64,
    pub tokens: TokenGenerator,
    pub smoothing: SmoothingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 500,
            max_token_attempts: 16,
            debounce_ms: 20,
            session_ttl_ms: 300_000,
            tokens: TokenGenerator::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

/// A paired motion session
///
/// Each session keeps:
/// - Its token and creation time
/// - The smoothing window and the filtered estimate derived from it
/// - Activity timestamps and counters for expiry and diagnostics
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub created: u64,
    /// Time of the last accepted update, or of creation before the first one
    pub last_update: u64,
    pub update_count: u64,
    pub throttled_count: u64,
    /// Most recent raw sample received, before smoothing
    pub last_raw: Option<MotionSample>,
    filter: MotionFilter,
}

impl Session {
    pub fn new(token: String, now: u64) -> Self {
        Self {
            token,
            created: now,
            last_update: now,
            update_count: 0,
            throttled_count: 0,
            last_raw: None,
            filter: MotionFilter::new(),
        }
    }

    pub fn filtered(&self) -> MotionSample {
        self.filter.filtered()
    }

    /// Number of samples currently in the smoothing window
    pub fn history_len(&self) -> usize {
        self.filter.len()
    }

    /// Milliseconds since the last accepted update
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_update)
    }

    pub fn is_expired(&self, ttl_ms: u64, now: u64) -> bool {
        is_expired(self.age(now), ttl_ms)
    }
}

/// Result of a successful `update` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateOutcome {
    pub filtered: MotionSample,
    /// True when the sample was dropped by the debounce
    pub throttled: bool,
    pub update_count: u64,
}

/// Snapshot of the table for the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub live: usize,
    pub fresh: usize,
    pub stale: usize,
    pub max_sessions: usize,
    pub oldest_age_ms: Option<u64>,
    pub newest_age_ms: Option<u64>,
    pub total_created: u64,
    pub total_updates: u64,
    pub total_throttled: u64,
    pub total_swept: u64,
    pub total_evicted: u64,
    pub total_removed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    created: u64,
    updates: u64,
    throttled: u64,
    swept: u64,
    evicted: u64,
    removed: u64,
}

/// Owns every live session, keyed by token.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    config: StoreConfig,
    counters: Counters,
}

impl SessionStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
            counters: Counters::default(),
        }
    }

    /// Creates a zeroed session and returns its token.
    ///
    /// The session starts with an empty smoothing window, a zero estimate and
    /// `last_update` set to `now`, so a poll made right away reads the center
    /// value. Fails with `AtCapacity` when the table is full of live sessions
    /// and with `TokenGenerationExhausted` when every draw collided with a
    /// live token.
    pub fn create(&mut self, now: u64) -> Result<String> {
        self.create_with_rng(now, &mut rand::thread_rng())
    }

    /// Same as `create`, drawing tokens from the given generator.
    ///
    /// When the table looks full, sessions already past the session TTL are
    /// dropped first: they are dead even though the sweeper has not reached
    /// them yet, and must not block new pairings. Live sessions are never
    /// evicted here.
    pub fn create_with_rng<R: Rng>(&mut self, now: u64, rng: &mut R) -> Result<String> {
        if self.sessions.len() >= self.config.max_sessions {
            self.sweep_expired(self.config.session_ttl_ms, now);
        }
        if self.sessions.len() >= self.config.max_sessions {
            return Err(BridgeError::AtCapacity {
                max_sessions: self.config.max_sessions,
            });
        }

        let attempts = self.config.max_token_attempts.max(1);
        let token = (0..attempts)
            .map(|_| self.config.tokens.generate(&mut *rng))
            .find(|candidate| !self.sessions.contains_key(candidate))
            .ok_or(BridgeError::TokenGenerationExhausted { attempts })?;

        info!("Session {} created", token);
        self.sessions
            .insert(token.clone(), Session::new(token.clone(), now));
        self.counters.created += 1;
        Ok(token)
    }

    /// Looks up a session without applying any TTL.
    ///
    /// Read endpoints apply their own staleness window on top of this, see
    /// `get_fresh`.
    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Looks up a session only if it was updated within `ttl_ms`.
    pub fn get_fresh(&self, token: &str, ttl_ms: u64, now: u64) -> Option<&Session> {
        self.sessions
            .get(token)
            .filter(|session| !session.is_expired(ttl_ms, now))
    }

    /// Feeds a raw sample into a session's smoother.
    ///
    /// Returns `InvalidToken` if no session exists for the token. Otherwise the
    /// sample goes through the outlier guard and window, the filtered estimate
    /// is recomputed, `last_update` moves forward (never backwards) and the
    /// update counter is bumped. Samples arriving within the debounce interval
    /// of the previous accepted update still succeed, but leave the session
    /// untouched apart from its throttle counter. The first update after
    /// creation is never throttled.
    pub fn update(&mut self, token: &str, x: f64, y: f64, now: u64) -> Result<UpdateOutcome> {
        let debounce_ms = self.config.debounce_ms;
        let session = self
            .sessions
            .get_mut(token)
            .ok_or(BridgeError::InvalidToken)?;

        if session.update_count > 0 && session.age(now) < debounce_ms {
            session.throttled_count += 1;
            self.counters.throttled += 1;
            return Ok(UpdateOutcome {
                filtered: session.filtered(),
                throttled: true,
                update_count: session.update_count,
            });
        }

        let raw = MotionSample::new(x, y);
        let filtered = session.filter.push(raw, &self.config.smoothing);
        session.last_raw = Some(raw);
        session.last_update = session.last_update.max(now);
        session.update_count += 1;
        self.counters.updates += 1;

        debug!(
            "Session {} update #{}: raw ({:.2}, {:.2}) -> filtered ({:.2}, {:.2})",
            token, session.update_count, x, y, filtered.x, filtered.y
        );

        Ok(UpdateOutcome {
            filtered,
            throttled: false,
            update_count: session.update_count,
        })
    }

    /// Removes a session explicitly
    ///
    /// Used when the phone ends the pairing itself. Returns false if the
    /// session was already gone, either closed before or swept.
    pub fn remove(&mut self, token: &str) -> bool {
        if self.sessions.remove(token).is_some() {
            info!("Session {} closed", token);
            self.counters.removed += 1;
            true
        } else {
            false
        }
    }

    /// Removes every session whose age exceeds `ttl_ms`
    ///
    /// A session exactly `ttl_ms` old is kept. Returns the number of sessions
    /// removed, which is also added to the swept counter reported by
    /// `stats`. Called by the background sweeper, and by `create` when the
    /// table is full.
    pub fn sweep_expired(&mut self, ttl_ms: u64, now: u64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|token, session| {
            let keep = !session.is_expired(ttl_ms, now);
            if !keep {
                debug!("Session {} expired after {}ms", token, session.age(now));
            }
            keep
        });
        let removed = before - self.sessions.len();
        self.counters.swept += removed as u64;
        removed
    }

    /// Evicts least-recently-updated sessions until at most `max_sessions`
    /// remain
    ///
    /// Sessions are ordered by their last accepted update, then by creation
    /// time and token so the choice is deterministic. Only the sweeper calls
    /// this, keeping eviction off the request path. Returns the number of
    /// sessions evicted.
    pub fn enforce_capacity(&mut self, max_sessions: usize) -> usize {
        let excess = self.sessions.len().saturating_sub(max_sessions);
        if excess == 0 {
            return 0;
        }

        let mut by_activity: Vec<(u64, u64, String)> = self
            .sessions
            .values()
            .map(|s| (s.last_update, s.created, s.token.clone()))
            .collect();
        by_activity.sort();

        for (_, _, token) in by_activity.into_iter().take(excess) {
            self.sessions.remove(&token);
            info!("Session {} evicted (store over capacity)", token);
        }
        self.counters.evicted += excess as u64;
        excess
    }

    /// Gathers population and counter figures for the health endpoint
    ///
    /// Sessions idle for longer than `read_ttl_ms` are reported as stale; they
    /// are still in the table until the sweeper removes them.
    pub fn stats(&self, now: u64, read_ttl_ms: u64) -> StoreStats {
        let ages: Vec<u64> = self.sessions.values().map(|s| s.age(now)).collect();
        let fresh = ages.iter().filter(|age| !is_expired(**age, read_ttl_ms)).count();

        StoreStats {
            live: self.sessions.len(),
            fresh,
            stale: self.sessions.len() - fresh,
            max_sessions: self.config.max_sessions,
            oldest_age_ms: ages.iter().copied().max(),
            newest_age_ms: ages.iter().copied().min(),
            total_created: self.counters.created,
            total_updates: self.counters.updates,
            total_throttled: self.counters.throttled,
            total_swept: self.counters.swept,
            total_evicted: self.counters.evicted,
            total_removed: self.counters.removed,
        }
    }

    /// Returns the number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
