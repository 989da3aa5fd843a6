use std::collections::HashMap;

use tokio::time::Instant;

use super::zone::Zone;

/// A debounce timer that has come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub zone: Zone,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    generation: u64,
    due: Instant,
}

/// Pending debounce timers, at most one per zone.
///
/// Timers are not tasks: the controller asks for [`DebounceTimers::next_deadline`],
/// sleeps until then alongside the bus, and collects what is due with
/// [`DebounceTimers::expire`]. That keeps timer actions on the same timeline as
/// message handling.
#[derive(Debug, Default)]
pub struct DebounceTimers {
    pending: HashMap<Zone, Pending>,
}

impl DebounceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an expiry for `zone`, replacing any timer already pending for it.
    pub fn arm(&mut self, zone: Zone, generation: u64, due: Instant) {
        self.pending.insert(zone, Pending { generation, due });
    }

    pub fn is_pending(&self, zone: Zone) -> bool {
        self.pending.contains_key(&zone)
    }

    /// Earliest instant at which a timer comes due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Remove and return every timer due at or before `now`, earliest first.
    pub fn expire(&mut self, now: Instant) -> Vec<Expiry> {
        let mut due: Vec<(Instant, Expiry)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(zone, p)| {
                (
                    p.due,
                    Expiry {
                        zone: *zone,
                        generation: p.generation,
                    },
                )
            })
            .collect();
        due.sort_by_key(|(at, expiry)| (*at, expiry.zone));

        for (_, expiry) in &due {
            self.pending.remove(&expiry.zone);
        }
        due.into_iter().map(|(_, expiry)| expiry).collect()
    }
}
