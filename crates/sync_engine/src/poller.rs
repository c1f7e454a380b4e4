//! Polling loop liveness and ticket tracking.
//!
//! The loop never performs I/O itself. It hands out a [`PollTicket`] per tick and later decides
//! whether the result carrying that ticket may still be merged.

/// Identity of one issued `fetchLatest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollTicket {
    /// Activation the ticket was issued under
    epoch: u64,
    seq: u64,
}

impl PollTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Why a poll result was dropped instead of merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discard {
    /// Engine torn down
    Disposed,
    /// Loop deactivated (or re-activated) after the ticket was issued, or the ticket was
    /// already consumed
    LoopStopped,
}

impl Discard {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Discard::Disposed => "disposed",
            Discard::LoopStopped => "loop_stopped",
        }
    }
}

/// Loop state: an active flag, a disposed flag and at most one live ticket
#[derive(Debug, Default)]
pub struct PollLoop {
    active: bool,
    disposed: bool,
    epoch: u64,
    next_seq: u64,
    in_flight: Option<PollTicket>,
}

impl PollLoop {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active && !self.disposed
    }

    /// Bumped on every activation
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Outstanding fetch, if its result has not come back yet
    #[inline]
    pub fn in_flight(&self) -> Option<PollTicket> {
        self.in_flight
    }

    /// Start ticking. Returns `false` if already active or disposed.
    pub fn activate(&mut self) -> bool {
        if self.active || self.disposed {
            return false;
        }
        self.active = true;
        self.epoch += 1;
        true
    }

    /// Stop ticking and orphan the in-flight request. Returns `false` if already inactive.
    pub fn deactivate(&mut self) -> bool {
        self.in_flight = None;
        std::mem::replace(&mut self.active, false)
    }

    /// Permanent; every later result is discarded
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.deactivate();
    }

    /// Ticket for a new tick.
    ///
    /// `None` while inactive or while the previous tick's fetch is still outstanding; ticks
    /// never overlap.
    pub fn issue(&mut self) -> Option<PollTicket> {
        if !self.is_active() || self.in_flight.is_some() {
            return None;
        }
        self.next_seq += 1;
        let ticket = PollTicket {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Whether the result for `ticket` may be merged. Consumes the ticket on success.
    pub fn accept(&mut self, ticket: PollTicket) -> Result<(), Discard> {
        if self.disposed {
            return Err(Discard::Disposed);
        }
        if !self.active || ticket.epoch != self.epoch || self.in_flight != Some(ticket) {
            return Err(Discard::LoopStopped);
        }
        self.in_flight = None;
        Ok(())
    }
}
