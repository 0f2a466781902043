use std::time::Duration;

use lento::{Flush, ManualClock, Pacer, Verdict};

/// Drives a pacer by hand, the way a custom event loop would.
fn main() {
    let clock = ManualClock::default();
    let mut pacer = Pacer::with_clock(
        |_: &u32, previous: Duration| (previous * 2).max(Duration::from_millis(100)),
        &clock,
    )
    .latest(true);

    let mut timer = None;
    for (at, item) in [(0, 1), (40, 2), (60, 3), (250, 4), (300, 5)] {
        let now = Duration::from_millis(at);

        // fire the flush timer first if it came due before this arrival
        if let Some((due, ticket)) = timer {
            if due <= now {
                clock.set(due);
                timer = None;
                let Flush { item, complete } = pacer.flush(ticket);
                if let Some(item) = item {
                    println!("{due:?}: flushed {item}");
                    pacer.emitted();
                }
                assert!(!complete);
            }
        }

        clock.set(now);
        match pacer.on_next(item) {
            Verdict::Emit(item) => {
                println!("{now:?}: emitted {item}");
                pacer.emitted();
            }
            Verdict::Schedule { delay, ticket } => {
                println!("{now:?}: holding {item} for {delay:?}");
                timer = Some((now + delay, ticket));
            }
            Verdict::Superseded(old) => println!("{now:?}: {item} replaced {old}"),
            Verdict::Dropped(item) => println!("{now:?}: dropped {item}"),
        }
    }

    if pacer.complete() {
        println!("done");
    } else if let Some((due, ticket)) = timer {
        clock.set(due);
        let flush = pacer.flush(ticket);
        println!("{due:?}: flushed {:?} and completed", flush.item);
    }
}
