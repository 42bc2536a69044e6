//! Page-state branch detection.
//!
//! At several points in the flow the site may render any of N mutually
//! exclusive screens, depending on company configuration. Each candidate is
//! expressed as a probe (a wait condition with its own timeout); all probes
//! run concurrently and the first to match decides the branch. A probe's own
//! timeout elapsing is a non-match, not an error — only the shared ceiling
//! expiring escalates, as a typed error the caller turns into a fatal
//! diagnostic capture.

use futures::future::{pending, select_all, BoxFuture, FutureExt};
use regex::Regex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::driver::web::WebDriver;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
#[error("no expected page state appeared within {ceiling_ms}ms")]
pub struct ProbeTimeout {
    pub ceiling_ms: u64,
}

/// A named wait condition. `wait` resolves only when the condition matches;
/// probes that never match simply stay pending.
pub struct Probe<'a, T> {
    pub label: &'static str,
    pub outcome: T,
    pub timeout: Duration,
    pub wait: BoxFuture<'a, ()>,
}

#[derive(Debug)]
pub struct Detected<T> {
    pub label: &'static str,
    pub outcome: T,
    pub elapsed: Duration,
}

/// Races the probes and returns the first match. Losing probes are dropped,
/// not treated as failures. Mutual exclusivity is not enforced — if two
/// probes could match, the first resolution wins.
pub async fn first_of<T: Send>(
    probes: Vec<Probe<'_, T>>,
    ceiling: Duration,
) -> Result<Detected<T>, ProbeTimeout> {
    let started = Instant::now();

    if probes.is_empty() {
        tokio::time::sleep(ceiling).await;
        return Err(ProbeTimeout {
            ceiling_ms: ceiling.as_millis() as u64,
        });
    }

    let armed: Vec<BoxFuture<'_, (&'static str, T)>> = probes
        .into_iter()
        .map(|p| {
            let Probe {
                label,
                outcome,
                timeout,
                wait,
            } = p;
            async move {
                match tokio::time::timeout(timeout, wait).await {
                    Ok(()) => (label, outcome),
                    // Own timeout elapsed: non-match, go quiet.
                    Err(_) => pending().await,
                }
            }
            .boxed()
        })
        .collect();

    match tokio::time::timeout(ceiling, select_all(armed)).await {
        Ok(((label, outcome), _, _)) => Ok(Detected {
            label,
            outcome,
            elapsed: started.elapsed(),
        }),
        Err(_) => Err(ProbeTimeout {
            ceiling_ms: ceiling.as_millis() as u64,
        }),
    }
}

/// Probe that matches when a selector becomes visible.
pub fn selector_probe<'a, T>(
    driver: &'a WebDriver,
    selector: &'a str,
    timeout: Duration,
    label: &'static str,
    outcome: T,
) -> Probe<'a, T> {
    Probe {
        label,
        outcome,
        timeout,
        wait: async move {
            loop {
                if driver.is_visible(selector).await.unwrap_or(false) {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        .boxed(),
    }
}

/// Probe that matches when the page URL matches a pattern.
pub fn url_probe<'a, T>(
    driver: &'a WebDriver,
    pattern: Regex,
    timeout: Duration,
    label: &'static str,
    outcome: T,
) -> Probe<'a, T> {
    Probe {
        label,
        outcome,
        timeout,
        wait: async move {
            loop {
                if let Ok(url) = driver.current_url().await {
                    if pattern.is_match(&url) {
                        return;
                    }
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper<'a>(
        resolve_after: Duration,
        timeout: Duration,
        label: &'static str,
        outcome: u32,
    ) -> Probe<'a, u32> {
        Probe {
            label,
            outcome,
            timeout,
            wait: async move {
                tokio::time::sleep(resolve_after).await;
            }
            .boxed(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_wins_without_waiting_for_others() {
        let probes = vec![
            sleeper(Duration::from_secs(100), Duration::from_millis(5000), "a", 1),
            sleeper(Duration::from_millis(2000), Duration::from_millis(8000), "b", 2),
            sleeper(Duration::from_secs(100), Duration::from_millis(8000), "c", 3),
        ];

        let detected = first_of(probes, Duration::from_secs(30)).await.unwrap();
        assert_eq!(detected.label, "b");
        assert_eq!(detected.outcome, 2);
        // Resolved at probe b's match time, not at any other probe's timeout.
        assert!(detected.elapsed < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_timeout_is_a_non_match() {
        // Probe a would "match" at 6s but its own timeout is 1s, so it must
        // go quiet; probe b matches at 4s and wins.
        let probes = vec![
            sleeper(Duration::from_secs(6), Duration::from_secs(1), "a", 1),
            sleeper(Duration::from_secs(4), Duration::from_secs(10), "b", 2),
        ];

        let detected = first_of(probes, Duration::from_secs(30)).await.unwrap();
        assert_eq!(detected.label, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_timeout_escalates() {
        let probes = vec![
            sleeper(Duration::from_secs(100), Duration::from_secs(5), "a", 1),
            sleeper(Duration::from_secs(100), Duration::from_secs(5), "b", 2),
        ];

        let err = first_of(probes, Duration::from_secs(10)).await.unwrap_err();
        assert_eq!(err.ceiling_ms, 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_probe_set_times_out() {
        let err = first_of(Vec::<Probe<'_, u32>>::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.ceiling_ms, 1_000);
    }
}
