//! Background loop feeding one cache partition from a watch stream.

use ::core::{fmt::Display, time::Duration};

use ::futures::{Stream, StreamExt};
use ::sparkgw_common::{application::SparkApplication, server::ShutdownListener};
use ::tracing::{error, info, warn};

use crate::cache::{CacheWriter, Event};

/// Pause before reconnecting once a watch stream has ended.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Apply the events of the stream returned by `connect` to `writer` until shutdown.
///
/// Errors on the stream are counted on the partition and the stream is polled again;
/// a watcher with backoff re-lists and re-watches on its own. A stream that ends is
/// replaced by a new one from `connect`.
pub async fn run_watch_loop<F, S, E>(
    mut connect: F,
    mut writer: CacheWriter,
    mut shutdown: ShutdownListener,
) where
    F: FnMut() -> S + Send,
    S: Stream<Item = Result<Event<SparkApplication>, E>> + Send,
    E: Display + Send,
{
    let scope = writer.scope().unwrap_or("all namespaces").to_owned();
    info!("Start watching SparkApplications of {}", scope);
    'reconnect: loop {
        let stream = connect();
        tokio::pin!(stream);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break 'reconnect,
                event = stream.next() => match event {
                    Some(Ok(event)) => writer.apply(event),
                    Some(Err(e)) => {
                        let failures = writer.record_failure();
                        warn!("Watch of {} failed ({} in a row): {}", scope, failures, e);
                    }
                    None => {
                        error!("Watch stream of {} ended, reconnecting", scope);
                        break;
                    }
                },
            }
        }
        tokio::select! {
            _ = shutdown.wait() => break 'reconnect,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
    info!("Stop watching SparkApplications of {}", scope);
}

#[cfg(test)]
mod tests {
    use ::futures::stream;
    use ::k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use ::sparkgw_common::server::Shutdown;
    use ::tokio::time::timeout;

    use super::*;
    use crate::cache::{watch_cache, CacheReader};

    fn app(name: &str) -> SparkApplication {
        SparkApplication {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("ns".to_owned()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn wait_until(reader: &CacheReader, check: impl Fn(&CacheReader) -> bool) {
        timeout(Duration::from_secs(5), async {
            while !check(reader) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("cache did not reach the expected state");
    }

    #[tokio::test]
    async fn feed_cache_until_shutdown() {
        let (reader, mut writers) = watch_cache(&[]);
        let shutdown = Shutdown::new();
        let events: Vec<Result<Event<SparkApplication>, String>> = vec![
            Ok(Event::Init),
            Ok(Event::InitApply(app("a"))),
            Ok(Event::InitDone),
            Err("connection reset".to_owned()),
            Ok(Event::Apply(app("b"))),
        ];
        let handle = tokio::spawn(run_watch_loop(
            move || stream::iter(events.clone()).chain(stream::pending()),
            writers.remove(0),
            shutdown.listener(),
        ));

        wait_until(&reader, |reader| reader.get("ns", "b").is_some()).await;
        assert!(reader.get("ns", "a").is_some());
        assert!(reader.is_ready(1));

        shutdown.trigger();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("watch loop did not stop")
            .expect("watch loop panicked");
    }

    #[tokio::test]
    async fn failures_mark_partition_unready() {
        let (reader, mut writers) = watch_cache(&[]);
        let shutdown = Shutdown::new();
        let events: Vec<Result<Event<SparkApplication>, String>> = vec![
            Ok(Event::InitDone),
            Err("forbidden".to_owned()),
            Err("forbidden".to_owned()),
        ];
        let handle = tokio::spawn(run_watch_loop(
            move || stream::iter(events.clone()).chain(stream::pending()),
            writers.remove(0),
            shutdown.listener(),
        ));

        wait_until(&reader, |reader| !reader.is_ready(2) && reader.is_ready(3)).await;

        shutdown.trigger();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("watch loop did not stop")
            .expect("watch loop panicked");
    }
}
