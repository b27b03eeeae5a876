//! Event capture for unit tests.

use std::sync::mpsc::{self, Sender};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt as _};

/// Layer forwarding the level of every event it sees.
struct LevelSink(Sender<Level>);

impl<S: Subscriber> Layer<S> for LevelSink {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let _sent = self.0.send(*event.metadata().level());
    }
}

/// Runs `body` under a thread-scoped subscriber and returns its result
/// with the number of `WARN` events emitted meanwhile.
pub(crate) fn count_warnings<T, F: FnOnce() -> T>(body: F) -> (T, usize) {
    let (tx, rx) = mpsc::channel();
    let subscriber = Registry::default().with(LevelSink(tx));
    let out = tracing::subscriber::with_default(subscriber, body);
    let warnings = rx.try_iter().filter(|level| *level == Level::WARN).count();
    (out, warnings)
}
