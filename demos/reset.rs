use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;
use lento::{Linear, Pacer, SmartThrottleExt};

#[tokio::main]
async fn main() {
    let (notify, notifications) = mpsc::unbounded::<String>();
    let (focus, focus_changes) = mpsc::unbounded::<()>();

    let producer = tokio::spawn(async move {
        for i in 0..30 {
            notify.unbounded_send(format!("notification {i}")).unwrap();
            // the user comes back after a while: start over with short intervals
            if i == 20 {
                focus.unbounded_send(()).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    });

    let policy = Linear::new(
        Duration::from_millis(50),
        Duration::from_millis(50),
        Duration::from_millis(400),
    )
    .unwrap();
    let pacer = Pacer::tokio(policy).latest(true);

    let start = tokio::time::Instant::now();
    let mut paced = std::pin::pin!(notifications.smart_throttle_with_reset(pacer, focus_changes));
    while let Some(message) = paced.next().await {
        println!("[{:>4}ms] {message}", start.elapsed().as_millis());
    }

    producer.await.unwrap();
}
