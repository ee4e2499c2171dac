//! Loop change detection
//!
//! Wall-proximity checks run every ~100ms and usually ask for exactly what
//! is already looping. Restarting the loop each time would click at every
//! restart, so each loop channel remembers the `(directions, volume)` of
//! the loop it last started and only resubmits when that changes.
//!
//! The memo is a cache of what was submitted, not of what the device is
//! doing. It is updated only after a successful submission and cleared
//! whenever the channel is torn down, so the next request always retries.
//! Every operation that changes a loop channel goes through here and holds
//! the memo lock across the channel call.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::{CHANNEL_COUNT, Channel, ChannelId};
use crate::config::EngineConfig;
use crate::buffer::SampleBuffer;
use crate::error::{PlayError, SubmitError};
use crate::mixer::mix;
use crate::tone::{self, ToneKind};

/// Compass direction of a nearby wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    const fn bit(self) -> u8 {
        match self {
            Direction::North => 1 << 0,
            Direction::East => 1 << 1,
            Direction::South => 1 << 2,
            Direction::West => 1 << 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of directions, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub const EMPTY: DirectionSet = DirectionSet(0);

    /// Build from a raw mask. Bits above West are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, direction: Direction) {
        self.0 |= direction.bit();
    }

    pub fn remove(&mut self, direction: Direction) {
        self.0 &= !direction.bit();
    }

    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in North, East, South, West order
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirectionSet::EMPTY;
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

impl<const N: usize> From<[Direction; N]> for DirectionSet {
    fn from(directions: [Direction; N]) -> Self {
        directions.into_iter().collect()
    }
}

impl fmt::Display for DirectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, direction) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(direction.name())?;
        }
        Ok(())
    }
}

/// What a loop request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// A new loop was submitted
    Started,
    /// The same loop is already running; nothing was submitted
    Unchanged,
    /// The request asked for silence and the channel is stopped
    Stopped,
    /// The engine has no output device
    Disabled,
}

/// Last loop successfully submitted on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMemo {
    #[default]
    Stopped,
    Looping { directions: DirectionSet, percent: u8 },
}

/// Per-channel loop memos.
#[derive(Debug, Default)]
pub struct LoopPolicy {
    memos: [Mutex<LoopMemo>; CHANNEL_COUNT],
}

impl LoopPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, channel: ChannelId) -> MutexGuard<'_, LoopMemo> {
        self.memos[channel.index()].lock().unwrap_or_else(|e| {
            warn!("{}: loop memo mutex poisoned; continuing", channel);
            e.into_inner()
        })
    }

    /// Current memo for `channel`
    pub fn memo(&self, channel: ChannelId) -> LoopMemo {
        *self.lock(channel)
    }

    /// Loop the wall tones for `directions` at `percent`, unless exactly that
    /// loop is already running.
    ///
    /// An empty set or zero volume stops the channel. The memo lock is held
    /// from the comparison through submission so two callers can't both
    /// decide to restart.
    pub fn request(
        &self,
        channel: &Channel,
        directions: DirectionSet,
        percent: u8,
        config: &EngineConfig,
    ) -> Result<LoopOutcome, PlayError> {
        tone::check_percent(percent)?;

        let id = channel.id();
        let mut memo = self.lock(id);

        if directions.is_empty() || percent == 0 {
            channel.stop();
            if *memo != LoopMemo::Stopped {
                debug!("{}: loop stopped", id);
            }
            *memo = LoopMemo::Stopped;
            return Ok(LoopOutcome::Stopped);
        }

        let wanted = LoopMemo::Looping {
            directions,
            percent,
        };
        if *memo == wanted {
            return Ok(LoopOutcome::Unchanged);
        }

        // The channel is untouched until play, so a bad tone leaves the memo as is
        let mut tones = Vec::with_capacity(directions.len());
        for direction in directions.iter() {
            let params = config
                .wall_tones
                .params(direction, config.sustain_ms)
                .at_percent(percent);
            tones.push(tone::generate(ToneKind::Sine, &params)?);
        }
        let buffer = mix(tones);

        if let Err(e) = channel.play(&buffer, true) {
            // An oversized buffer is refused before teardown and the old sound plays on
            if !matches!(e, SubmitError::BufferTooLarge { .. }) {
                channel.stop();
                *memo = LoopMemo::Stopped;
            }
            return Err(e.into());
        }

        debug!(
            "{}: looping {} at {}% ({} frames)",
            id,
            directions,
            percent,
            buffer.frames()
        );
        *memo = wanted;
        Ok(LoopOutcome::Started)
    }

    /// Stop the loop on `channel` regardless of the memo.
    pub fn stop(&self, channel: &Channel) {
        let mut memo = self.lock(channel.id());
        channel.stop();
        *memo = LoopMemo::Stopped;
    }

    /// Play a one-shot on `channel`, replacing any loop there.
    ///
    /// The memo is cleared once the old sound has been torn down. An
    /// oversized buffer is refused before teardown, so the memo stays.
    pub fn take_over(&self, channel: &Channel, buffer: &SampleBuffer) -> Result<(), SubmitError> {
        let mut memo = self.lock(channel.id());
        let result = channel.play(buffer, false);
        if !matches!(result, Err(SubmitError::BufferTooLarge { .. })) {
            *memo = LoopMemo::Stopped;
        }
        result
    }
}
