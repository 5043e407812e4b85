use std::thread;
use std::time::Duration;

use formulary::config::SaveQueueConfig;
use formulary::persist::{MemoryStore, SaveQueue};
use formulary::{FormulaId, parse};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let store = MemoryStore::new();
    let config = SaveQueueConfig::default()
        .debounce(Duration::from_millis(50))
        .max_delay(Duration::from_millis(400));
    let queue = SaveQueue::new(store.clone(), &config).expect("failed to start save queue");

    let id = FormulaId::from("f_total");
    let mut text = String::from("{price}");
    for i in 1..=10 {
        text.push_str(&format!(" + {i}"));
        let seq = parse(&text).expect("valid notation");
        let generation = queue.submit(id.clone(), seq).expect("queue running");
        println!("submitted generation {generation}");
        thread::sleep(Duration::from_millis(10));
    }

    store.fail_next(1);
    queue
        .submit(id.clone(), parse(&format!("{text} * 2")).expect("valid notation"))
        .expect("queue running");
    queue.flush().expect("queue running");

    for event in queue.try_events() {
        println!("{event:?}");
    }

    queue.retry_failed().expect("queue running");
    queue.flush().expect("queue running");
    for event in queue.try_events() {
        println!("{event:?}");
    }

    println!(
        "stored after {} writes: {}",
        store.save_count(),
        store.get(&id).map(|s| s.to_string()).unwrap_or_default()
    );
}
