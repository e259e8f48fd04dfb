//! Domain types for the queue board.
//!
//! Value objects shared by the reducer, the HTTP layer and the ticket sheet
//! renderer. Every constructor validates, so a `TicketRange` or
//! `VenueSettings` in hand is always usable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Ticket numbers
// ============================================================================

/// A printed ticket number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(u32);

impl TicketNumber {
    /// Wrap a raw ticket number
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw number
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TicketNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// ============================================================================
// Ticket range
// ============================================================================

/// Most tickets a single range may hold.
pub const MAX_TICKETS: u32 = 10_000;

/// Why a ticket range was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Not of the form `start-end`
    #[error("range must look like `start-end`, got `{0}`")]
    Malformed(String),

    /// Ticket numbers start at 1
    #[error("ticket numbers start at 1")]
    StartsAtZero,

    /// `end` below `start`
    #[error("range end {end} is below its start {start}")]
    Reversed {
        /// First number
        start: u32,
        /// Last number
        end: u32,
    },

    /// More than [`MAX_TICKETS`] numbers
    #[error("range holds {len} tickets, the limit is {MAX_TICKETS}")]
    TooLarge {
        /// Requested number of tickets
        len: u64,
    },
}

/// Inclusive range of issued ticket numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct TicketRange {
    start: u32,
    end: u32,
}

#[derive(Deserialize)]
struct RawRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawRange> for TicketRange {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl TicketRange {
    /// Create a range of `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns a [`RangeError`] unless `1 <= start <= end` and the range holds
    /// at most [`MAX_TICKETS`] numbers.
    pub fn new(start: u32, end: u32) -> Result<Self, RangeError> {
        if start == 0 {
            return Err(RangeError::StartsAtZero);
        }
        if end < start {
            return Err(RangeError::Reversed { start, end });
        }
        let len = u64::from(end - start) + 1;
        if len > u64::from(MAX_TICKETS) {
            return Err(RangeError::TooLarge { len });
        }
        Ok(Self { start, end })
    }

    /// First ticket number
    #[must_use]
    pub const fn start(&self) -> TicketNumber {
        TicketNumber(self.start)
    }

    /// Last ticket number
    #[must_use]
    pub const fn end(&self) -> TicketNumber {
        TicketNumber(self.end)
    }

    /// Number of tickets in the range (never zero)
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false; kept for the `len` convention
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `ticket` was issued in this range
    #[must_use]
    pub const fn contains(&self, ticket: TicketNumber) -> bool {
        self.start <= ticket.0 && ticket.0 <= self.end
    }

    /// The `index`-th ticket (0-based), if the range is that long
    #[must_use]
    pub fn nth(&self, index: u32) -> Option<TicketNumber> {
        (index < self.len()).then(|| TicketNumber(self.start + index))
    }

    /// Position of `ticket` in the range (0-based)
    #[must_use]
    pub fn position(&self, ticket: TicketNumber) -> Option<u32> {
        self.contains(ticket).then(|| ticket.0 - self.start)
    }

    /// All ticket numbers in order
    pub fn iter(&self) -> impl Iterator<Item = TicketNumber> + '_ {
        (self.start..=self.end).map(TicketNumber)
    }
}

impl fmt::Display for TicketRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for TicketRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let (start, end) = s.split_once('-').ok_or_else(malformed)?;
        let start = start.trim().parse().map_err(|_| malformed())?;
        let end = end.trim().parse().map_err(|_| malformed())?;
        Self::new(start, end)
    }
}

// ============================================================================
// Venue settings
// ============================================================================

/// Default venue capacity.
pub const DEFAULT_MAX_INSIDE: u32 = 50;

/// Default size of the "get ready" window.
pub const DEFAULT_NOTIFY_COUNT: u32 = 3;

/// Largest accepted notify window.
pub const MAX_NOTIFY_COUNT: u32 = 100;

/// Why venue settings were refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Capacity of zero would never call anyone
    #[error("max_inside must be at least 1")]
    NoCapacity,

    /// Notify window outside `1..=MAX_NOTIFY_COUNT`
    #[error("notify_count must be between 1 and {MAX_NOTIFY_COUNT}, got {0}")]
    NotifyCount(u32),
}

/// Capacity and notification settings of the venue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueSettings {
    /// How many people may be inside at once
    pub max_inside: u32,
    /// How many numbers the "get ready" list shows
    pub notify_count: u32,
}

impl Default for VenueSettings {
    fn default() -> Self {
        Self {
            max_inside: DEFAULT_MAX_INSIDE,
            notify_count: DEFAULT_NOTIFY_COUNT,
        }
    }
}

impl VenueSettings {
    /// Validated settings.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] for a zero capacity or a notify window
    /// outside `1..=MAX_NOTIFY_COUNT`.
    pub const fn new(max_inside: u32, notify_count: u32) -> Result<Self, SettingsError> {
        if max_inside == 0 {
            return Err(SettingsError::NoCapacity);
        }
        if notify_count == 0 || notify_count > MAX_NOTIFY_COUNT {
            return Err(SettingsError::NotifyCount(notify_count));
        }
        Ok(Self {
            max_inside,
            notify_count,
        })
    }

    /// Settings as submitted by the admin form, where a missing or zero value
    /// means "use the default".
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NotifyCount`] for a window above
    /// `MAX_NOTIFY_COUNT`.
    pub fn from_form(max_inside: Option<u32>, notify_count: Option<u32>) -> Result<Self, SettingsError> {
        let max_inside = max_inside.filter(|v| *v > 0).unwrap_or(DEFAULT_MAX_INSIDE);
        let notify_count = notify_count
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_NOTIFY_COUNT);
        Self::new(max_inside, notify_count)
    }
}
