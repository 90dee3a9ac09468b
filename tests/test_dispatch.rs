//! Tests for the reader-to-consumer dispatch queue

use std::thread;
use std::time::Instant;

use claude_session::{DispatchAction, DispatchQueue, LogKind};

fn entry(text: String) -> DispatchAction {
    DispatchAction::Log {
        kind: LogKind::Status,
        text,
    }
}

#[test]
fn test_each_producer_keeps_its_order_when_interleaved() {
    let queue = DispatchQueue::new(Instant::now());

    let producers: Vec<_> = ["out", "err"]
        .into_iter()
        .map(|name| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    queue.push(1, entry(format!("{name}-{i}")));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let drained = queue.drain();
    assert_eq!(drained.len(), 1000);
    assert!(queue.is_empty());

    for name in ["out", "err"] {
        let seen: Vec<usize> = drained
            .iter()
            .filter_map(|pending| match &pending.action {
                DispatchAction::Log { text, .. } => text.strip_prefix(&format!("{name}-"))?.parse().ok(),
                _ => None,
            })
            .collect();
        assert_eq!(seen, (0..500).collect::<Vec<_>>(), "order broken for {name}");
    }
}

#[test]
fn test_drain_is_fifo() {
    let queue = DispatchQueue::new(Instant::now());
    for text in ["A", "B", "C"] {
        queue.push(1, entry(text.to_string()));
    }
    let texts: Vec<_> = queue
        .drain()
        .into_iter()
        .map(|pending| match pending.action {
            DispatchAction::Log { text, .. } => text,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(texts, ["A", "B", "C"]);
}
