//! Wait for heaters (`M109`, `M190`)

use heapless::Vec;

use super::CycleContext;
use crate::engine::Outcome;
use crate::traits::{HeaterId, MAX_HEATERS};

/// Hold command dispatch until every listed heater is at its target
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaterWait {
    heaters: Vec<HeaterId, MAX_HEATERS>,
}

impl HeaterWait {
    /// Wait for the given heaters; extra entries beyond the heater count are ignored
    pub fn new(heaters: &[HeaterId]) -> Self {
        let mut list = Vec::new();
        for &h in heaters.iter().take(MAX_HEATERS) {
            let _ = list.push(h);
        }
        Self { heaters: list }
    }

    pub(crate) fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        if self.heaters.iter().all(|&h| cx.thermal.at_target(h)) {
            Outcome::Done
        } else {
            Outcome::Pending
        }
    }
}
