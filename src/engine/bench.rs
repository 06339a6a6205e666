//! Repeated timing runs for the CLI `--repeat` flag.

use serde::Serialize;
use std::time::Duration;

/// Min / max / average wall time over a series of runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Timings {
    pub runs: usize,
    pub min: Duration,
    pub max: Duration,
    pub avg: Duration,
}

/// Run `f` `times` times (at least once), stopping at the first error.
/// Returns the last value and the timings of all runs.
pub fn run_repeated<T, E>(
    times: usize,
    mut f: impl FnMut() -> Result<(T, Duration), E>,
) -> Result<(T, Timings), E> {
    let (mut last, first) = f()?;
    let mut samples = Vec::with_capacity(times.max(1));
    samples.push(first);
    for _ in 1..times {
        let (value, elapsed) = f()?;
        samples.push(elapsed);
        last = value;
    }
    let min = samples.iter().copied().fold(first, Duration::min);
    let max = samples.iter().copied().fold(first, Duration::max);
    let sum: Duration = samples.iter().sum();
    let runs = samples.len();
    let timings = Timings {
        runs,
        min,
        max,
        avg: sum / u32::try_from(runs).unwrap_or(u32::MAX),
    };
    Ok((last, timings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_of_three_runs() {
        let mut samples = [30, 10, 20].into_iter().map(Duration::from_millis);
        let (_, t) =
            run_repeated::<_, ()>(3, || Ok(((), samples.next().unwrap_or_default()))).unwrap();
        assert_eq!(t.runs, 3);
        assert_eq!(t.min, Duration::from_millis(10));
        assert_eq!(t.max, Duration::from_millis(30));
        assert_eq!(t.avg, Duration::from_millis(20));
    }

    #[test]
    fn repeat_runs_at_least_once_and_stops_on_error() {
        let mut calls = 0;
        let (v, t) = run_repeated::<_, ()>(0, || {
            calls += 1;
            Ok((calls, Duration::ZERO))
        })
        .unwrap();
        assert_eq!((v, t.runs), (1, 1));

        let mut calls = 0;
        let res = run_repeated(5, || {
            calls += 1;
            if calls == 2 { Err("boom") } else { Ok(((), Duration::ZERO)) }
        });
        assert_eq!(res.unwrap_err(), "boom");
        assert_eq!(calls, 2);
    }
}
