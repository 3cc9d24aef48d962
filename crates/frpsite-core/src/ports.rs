// ── Bind-port allocation ──
//
// Allocation is a pure function of the current used-port snapshot.
// There is deliberately no "next port" counter: sites get deleted and
// their ports freed, and two independent batch operations must not
// collide. Callers thread a growing used-set through sequential calls.

use std::collections::HashSet;

use crate::error::CoreError;

/// First port considered for allocation unless configured otherwise.
pub const DEFAULT_START_PORT: u16 = 18000;

/// Upper bound of the scan range (inclusive).
pub const MAX_PORT: u16 = 65535;

/// Return the smallest free port in `start..=max`.
pub fn allocate(used: &HashSet<u16>, start: u16, max: u16) -> Result<u16, CoreError> {
    (start..=max)
        .find(|port| !used.contains(port))
        .ok_or(CoreError::PortRangeExhausted { start, max })
}

/// Allocate `count` ports at once.
///
/// Non-consecutive mode repeats the single scan, feeding each result
/// back into the working set -- the ports come out strictly increasing
/// and pairwise distinct. Consecutive mode finds the first window of
/// `count` contiguous free ports.
pub fn allocate_many(
    used: &HashSet<u16>,
    count: usize,
    start: u16,
    max: u16,
    consecutive: bool,
) -> Result<Vec<u16>, CoreError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if consecutive {
        return allocate_window(used, count, start, max);
    }

    let mut working = used.clone();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let port = allocate(&working, start, max)?;
        working.insert(port);
        out.push(port);
    }
    Ok(out)
}

/// Scan for `count` contiguous free ports starting at `start`.
fn allocate_window(
    used: &HashSet<u16>,
    count: usize,
    start: u16,
    max: u16,
) -> Result<Vec<u16>, CoreError> {
    let exhausted = CoreError::PortRangeExhausted { start, max };
    let Ok(span) = u16::try_from(count - 1) else {
        return Err(exhausted);
    };

    // Widen to u32 so the window arithmetic cannot wrap at 65535.
    let mut base = u32::from(start);
    while base + u32::from(span) <= u32::from(max) {
        // In range by the loop condition.
        let lo = u16::try_from(base).unwrap_or(max);
        match (0..=span).map(|offset| lo + offset).find(|port| used.contains(port)) {
            None => return Ok((0..=span).map(|offset| lo + offset).collect()),
            Some(taken) => base = u32::from(taken) + 1,
        }
    }
    Err(exhausted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn used(ports: &[u16]) -> HashSet<u16> {
        ports.iter().copied().collect()
    }

    #[test]
    fn allocates_start_port_when_range_is_empty() {
        assert_eq!(allocate(&used(&[]), 18000, MAX_PORT).unwrap(), 18000);
    }

    // Scenario: existing {18015, 18016, 18017} -> next sequential port.
    #[test]
    fn skips_used_ports() {
        let snapshot = used(&[18015, 18016, 18017]);
        assert_eq!(allocate(&snapshot, 18015, MAX_PORT).unwrap(), 18018);
    }

    #[test]
    fn allocation_is_deterministic() {
        let snapshot = used(&[18000, 18002]);
        let first = allocate(&snapshot, 18000, MAX_PORT).unwrap();
        let second = allocate(&snapshot, 18000, MAX_PORT).unwrap();
        assert_eq!(first, 18001);
        assert_eq!(first, second);
    }

    #[test]
    fn feeding_results_back_yields_increasing_distinct_ports() {
        let mut snapshot = used(&[18001]);
        let mut previous = 0;
        for _ in 0..10 {
            let port = allocate(&snapshot, 18000, MAX_PORT).unwrap();
            assert!(port > previous || previous == 0);
            assert!(!snapshot.contains(&port));
            snapshot.insert(port);
            previous = port;
        }
    }

    #[test]
    fn exhausted_range_is_an_error() {
        let snapshot = used(&[65534, 65535]);
        let err = allocate(&snapshot, 65534, MAX_PORT).unwrap_err();
        assert!(matches!(
            err,
            CoreError::PortRangeExhausted {
                start: 65534,
                max: MAX_PORT
            }
        ));
    }

    #[test]
    fn many_non_consecutive_threads_the_used_set() {
        let snapshot = used(&[18001, 18003]);
        let ports = allocate_many(&snapshot, 4, 18000, MAX_PORT, false).unwrap();
        assert_eq!(ports, vec![18000, 18002, 18004, 18005]);
    }

    #[test]
    fn many_zero_is_a_noop() {
        assert!(allocate_many(&used(&[]), 0, 18000, MAX_PORT, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn consecutive_window_skips_past_collisions() {
        // 18002 splits the first candidate windows; the first clean run
        // of three starts at 18003.
        let snapshot = used(&[18002]);
        let ports = allocate_many(&snapshot, 3, 18000, MAX_PORT, true).unwrap();
        assert_eq!(ports, vec![18003, 18004, 18005]);
    }

    #[test]
    fn consecutive_window_at_range_end() {
        let ports = allocate_many(&used(&[]), 3, 65533, MAX_PORT, true).unwrap();
        assert_eq!(ports, vec![65533, 65534, 65535]);
    }

    #[test]
    fn consecutive_window_exhaustion() {
        let snapshot = used(&[65534]);
        let err = allocate_many(&snapshot, 3, 65532, MAX_PORT, true).unwrap_err();
        assert!(matches!(err, CoreError::PortRangeExhausted { .. }));
    }
}
