//! Entity feed over the console channel.
//!
//! One polling cycle lists every live projectile of the configured class,
//! then asks for each projectile's collision component position. The
//! result is a single snapshot value in discovery order.

use std::sync::Arc;

use axethrow_core::Vec3;
use axethrow_core::config::FeedConfig;
use futures::future::join_all;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::HostError;
use crate::host::{ConsoleChannel, LineMatch, WatchWindow};

/// Entity id → last observed position, in discovery order.
pub type Snapshot = IndexMap<String, Vec3>;

/// Anything that can produce one snapshot per call.
///
/// The tracker is written against this trait so it can be driven by a
/// scripted source in tests.
#[async_trait::async_trait]
pub trait EntitySource: Send + Sync {
    /// Runs one polling cycle.
    ///
    /// An `Err` means the cycle produced no usable observation at all; the
    /// caller keeps its previous state.
    async fn poll(&self) -> Result<Snapshot, HostError>;
}

/// Projectile feed backed by a [`ConsoleChannel`].
pub struct EntityFeed {
    console: Arc<dyn ConsoleChannel>,
    list_directive: String,
    list_pattern: Regex,
    window: WatchWindow,
}

impl EntityFeed {
    /// Creates a feed for the configured projectile class.
    ///
    /// # Errors
    ///
    /// Returns an error if the class name produces an invalid pattern.
    pub fn new(console: Arc<dyn ConsoleChannel>, config: &FeedConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            console,
            list_directive: list_directive(&config.entity_class),
            list_pattern: list_pattern(&config.entity_class)?,
            window: WatchWindow {
                idle: config.response_window,
                max: config.max_window,
            },
        })
    }

    async fn position_of(&self, id: &str) -> Result<Option<Vec3>, HostError> {
        let Ok(pattern) = position_pattern(id) else {
            trace!(id, "entity id does not form a valid pattern");
            return Ok(None);
        };

        let matches = self
            .console
            .watch(&position_directive(id), &pattern, self.window)
            .await?;

        Ok(matches.iter().find_map(parse_position))
    }
}

impl std::fmt::Debug for EntityFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFeed")
            .field("list_directive", &self.list_directive)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl EntitySource for EntityFeed {
    async fn poll(&self) -> Result<Snapshot, HostError> {
        let listed = self
            .console
            .watch(&self.list_directive, &self.list_pattern, self.window)
            .await?;

        let mut ids: Vec<String> = Vec::with_capacity(listed.len());
        for found in &listed {
            match found.get("id") {
                Some(id) if !ids.iter().any(|seen| seen == id) => ids.push(id.to_string()),
                Some(_) => {}
                None => trace!(line = found.line(), "list line without id"),
            }
        }

        let positions = join_all(ids.iter().map(|id| self.position_of(id))).await;

        let mut snapshot = Snapshot::with_capacity(ids.len());
        for (id, position) in ids.into_iter().zip(positions) {
            match position {
                Ok(Some(position)) => {
                    snapshot.insert(id, position);
                }
                Ok(None) => trace!(id, "no position reported"),
                Err(e) => debug!(id, error = %e, "position query failed"),
            }
        }

        Ok(snapshot)
    }
}

// ============================================================================
// Directives & Patterns
// ============================================================================

/// Directive listing every live projectile of `class`.
#[must_use]
pub fn list_directive(class: &str) -> String {
    format!("getAll Projectile_{class}_C RelativeLocation")
}

/// Pattern matching one line of the list response.
///
/// The `id` capture is greedy and runs to the end of the line, so ids keep
/// the trailing `.RelativeLocation =` text. Position queries reuse the id
/// exactly as captured.
///
/// # Errors
///
/// Returns an error if the resulting pattern is invalid.
pub fn list_pattern(class: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"Projectile_{}_C .+PersistentLevel\.(?<id>.+)",
        regex::escape(class)
    ))
}

/// Directive asking for one projectile's collision component position.
#[must_use]
pub fn position_directive(id: &str) -> String {
    format!("getAll SphereComponent RelativeLocation Outer={id}")
}

/// Pattern matching the position line for entity `id`.
///
/// # Errors
///
/// Returns an error if the resulting pattern is invalid.
pub fn position_pattern(id: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"SphereComponent .+?PersistentLevel\.{}\.CollisionComponent\.RelativeLocation = \(X=(?<x>[\d\.-]+),Y=(?<y>[\d\.-]+),Z=(?<z>[\d\.-]+)\)",
        regex::escape(id)
    ))
}

/// Extracts a position from a line matched by [`position_pattern`].
///
/// Returns `None` when any coordinate fails to parse.
#[must_use]
pub fn parse_position(found: &LineMatch) -> Option<Vec3> {
    let coord = |name: &str| found.get(name)?.parse::<f64>().ok().filter(|v| v.is_finite());
    Some(Vec3::new(coord("x")?, coord("y")?, coord("z")?))
}

/// Parses a raw console line as a position report for `id`.
#[must_use]
pub fn position_from_line(id: &str, line: &str) -> Option<Vec3> {
    let pattern = position_pattern(id).ok()?;
    LineMatch::capture(&pattern, line).as_ref().and_then(parse_position)
}
