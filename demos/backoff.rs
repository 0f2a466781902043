use std::time::Duration;

use futures::{StreamExt, stream};
use lento::{Exponential, Pacer, SmartThrottleExt};
use tokio_stream::wrappers::IntervalStream;

#[tokio::main]
async fn main() {
    println!("Exponential backoff");
    println!("===================");

    // A noisy source: an event every 20ms for two seconds
    let source = IntervalStream::new(tokio::time::interval(Duration::from_millis(20)))
        .enumerate()
        .map(|(n, _)| n)
        .take(100);

    let backoff =
        Exponential::new(Duration::from_millis(50), 2.0, Duration::from_millis(800)).unwrap();
    let pacer = Pacer::tokio(backoff).latest(true);

    let start = tokio::time::Instant::now();
    let mut paced = std::pin::pin!(source.smart_throttle(pacer));
    while let Some(n) = paced.next().await {
        println!(
            "event #{n:<3} elapsed={:?} next interval={:?}",
            start.elapsed(),
            paced.interval()
        );
    }

    // A one-off burst is reduced to its first and last element
    let burst = stream::iter(["first", "second", "third", "last"]);
    let pacer = Pacer::tokio(lento::Fixed(Duration::from_millis(100))).latest(true);
    let kept: Vec<_> = burst.smart_throttle(pacer).collect().await;
    println!("burst kept: {kept:?}");
}
