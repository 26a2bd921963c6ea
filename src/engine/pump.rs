use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::render::backend::MapEngine;

/// How a pump loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    /// The engine reported that all tiles and scene resources are in.
    pub finished: bool,
    pub iterations: u32,
    pub elapsed: Duration,
}

/// Calls `engine.update(slice)` until it reports completion or `deadline` has passed.
///
/// The engine is always updated at least once. Hitting the deadline is not an error: the caller
/// renders whatever is loaded so far.
pub fn pump_until_idle<E>(engine: &mut E, slice: Duration, deadline: Duration) -> PumpOutcome
where
    E: MapEngine + ?Sized,
{
    let start = Instant::now();
    let mut iterations = 0u32;

    loop {
        iterations = iterations.saturating_add(1);
        if engine.update(slice) {
            let elapsed = start.elapsed();
            debug!("{} idle after {iterations} update(s) in {elapsed:?}", engine.name());
            return PumpOutcome { finished: true, iterations, elapsed };
        }

        let elapsed = start.elapsed();
        if elapsed >= deadline {
            warn!(
                "{} still loading after {iterations} update(s) in {elapsed:?}, rendering partial view",
                engine.name()
            );
            return PumpOutcome { finished: false, iterations, elapsed };
        }
    }
}
