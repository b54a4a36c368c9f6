// tests/rate_limiter.rs
//
// Rate non-violation under paused tokio time: with a domain configured at
// R requests/minute, no 60-second window may contain more than R acquires
// (small tolerance for refill granularity).

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use athens_listing_validator::RateLimiter;

#[tokio::test(start_paused = true)]
async fn no_sixty_second_window_exceeds_the_budget() {
    let rate = 6.0; // 6 per minute → one token every 10s
    let rl = RateLimiter::new(30.0).unwrap();
    rl.configure("spitogatos.gr", rate).unwrap();

    let mut timestamps = Vec::new();
    for _ in 0..12 {
        rl.acquire("spitogatos.gr").await;
        timestamps.push(Instant::now());
    }

    let window = Duration::from_secs(60);
    for (i, &start) in timestamps.iter().enumerate() {
        let in_window = timestamps[i..]
            .iter()
            .take_while(|&&t| t.duration_since(start) < window)
            .count();
        // +1 tolerance for boundary/refill granularity.
        assert!(
            in_window <= rate as usize + 1,
            "window starting at request {i} held {in_window} requests"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn unconfigured_domain_uses_default_rate() {
    let rl = RateLimiter::new(60.0).unwrap(); // 1/s default
    rl.acquire("unknown.gr").await; // bucket starts full, immediate
    let before = Instant::now();
    rl.acquire("unknown.gr").await;
    let waited = before.elapsed();
    assert!(
        waited >= Duration::from_millis(900) && waited <= Duration::from_millis(1200),
        "expected ~1s spacing, waited {waited:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_workers_share_one_domain_budget() {
    let rl = Arc::new(RateLimiter::new(60.0).unwrap()); // 1 token/second
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let rl = Arc::clone(&rl);
        handles.push(tokio::spawn(async move {
            rl.acquire("xe.gr").await;
            Instant::now()
        }));
    }

    let mut finish_times = Vec::new();
    for h in handles {
        finish_times.push(h.await.unwrap());
    }
    finish_times.sort();

    // Four acquires at 1/s: the last cannot land before ~3s.
    let total = finish_times.last().unwrap().duration_since(started);
    assert!(total >= Duration::from_millis(2700), "took only {total:?}");
}
