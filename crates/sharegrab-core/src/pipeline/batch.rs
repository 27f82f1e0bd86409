//! Independent pipelines for many links on a bounded pool of threads.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use crate::adapter::AdapterRegistry;
use crate::control::CancelToken;
use crate::error::{FailureKind, PipelineError};
use crate::http::HttpClient;

use super::{Pipeline, PipelineOutcome};

/// Outcome of one input of a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub input: String,
    pub result: Result<PipelineOutcome, PipelineError>,
}

/// Runs one pipeline per input with at most `limit` (min 1) in flight.
///
/// Results come back in input order. Workers pull from a shared queue, so a
/// slow link only holds up its own worker. Cancelling `cancel` makes queued
/// runs fail fast with `Cancelled`. With `fail_fast` the first real failure
/// cancels `cancel` itself.
pub fn run_batch(
    registry: &AdapterRegistry,
    http: &dyn HttpClient,
    dest_dir: &Path,
    inputs: &[String],
    limit: usize,
    cancel: &CancelToken,
    fail_fast: bool,
) -> Vec<BatchResult> {
    if inputs.is_empty() {
        return Vec::new();
    }
    let workers = limit.max(1).min(inputs.len());
    let queue: Mutex<VecDeque<(usize, &String)>> =
        Mutex::new(inputs.iter().enumerate().collect());
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || loop {
                let next = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(poisoned) => poisoned.into_inner().pop_front(),
                };
                let Some((index, input)) = next else {
                    break;
                };
                let result = Pipeline::new(registry, http, dest_dir)
                    .cancel_token(cancel.clone())
                    .run(input);
                let stop = fail_fast
                    && result
                        .as_ref()
                        .is_err_and(|e| e.kind() != FailureKind::Cancelled);
                if stop && !cancel.is_cancelled() {
                    tracing::info!(%input, "stopping batch after first failure");
                    cancel.cancel();
                }
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<Result<PipelineOutcome, PipelineError>>> =
        (0..inputs.len()).map(|_| None).collect();
    for (index, result) in rx {
        slots[index] = Some(result);
    }
    inputs
        .iter()
        .zip(slots)
        .filter_map(|(input, slot)| {
            slot.map(|result| BatchResult {
                input: input.clone(),
                result,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrabConfig;
    use crate::http::fake::{FakeHttp, Reply};

    fn registry() -> AdapterRegistry {
        let cfg: GrabConfig = toml::from_str(
            r#"
            [[sites]]
            name = "clips"
            url_pattern = "^https://clips\\.test/"
            id_rule = { type = "path_segment", index = -1 }

            [sites.rules]
            locator = { type = "body" }
            title = { type = "json", path = "name" }

            [[sites.rules.items]]
            path = "src"
            extension = "mp4"
            "#,
        )
        .unwrap();
        AdapterRegistry::from_config(&cfg).unwrap()
    }

    fn http(ids: &[&str]) -> FakeHttp {
        let mut http = FakeHttp::new();
        for id in ids {
            http = http
                .page(
                    &format!("https://clips.test/v/{id}"),
                    &format!(r#"{{"name":"clip {id}","src":"https://cdn.clips.test/{id}.mp4"}}"#),
                )
                .route(
                    &format!("https://cdn.clips.test/{id}.mp4"),
                    Reply::Page {
                        status: 200,
                        headers: Vec::new(),
                        body: format!("bytes of {id}").into_bytes(),
                    },
                );
        }
        http
    }

    #[test]
    fn results_follow_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let ids = ["a", "b", "c", "d", "e"];
        let http = http(&ids);
        let inputs: Vec<String> = ids
            .iter()
            .map(|id| format!("https://clips.test/v/{id}"))
            .chain(["https://nowhere.test/x".to_string()])
            .collect();

        let cancel = CancelToken::new();
        let results = run_batch(&registry(), &http, dir.path(), &inputs, 3, &cancel, false);
        assert_eq!(results.len(), inputs.len());
        for (result, input) in results.iter().zip(&inputs) {
            assert_eq!(&result.input, input);
        }
        for (result, id) in results.iter().zip(ids) {
            let outcome = result.result.as_ref().unwrap();
            assert_eq!(outcome.files, vec![dir.path().join(format!("clip {id}.mp4"))]);
        }
        let last = results.last().unwrap().result.as_ref().unwrap_err();
        assert_eq!(last.kind(), FailureKind::Unsupported);
    }

    #[test]
    fn zero_limit_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let http = http(&["a"]);
        let inputs = vec!["https://clips.test/v/a".to_string()];
        let cancel = CancelToken::new();
        let results = run_batch(&registry(), &http, dir.path(), &inputs, 0, &cancel, false);
        assert!(results[0].result.is_ok());
        assert!(run_batch(&registry(), &http, dir.path(), &[], 4, &cancel, false).is_empty());
    }

    #[test]
    fn cancelled_batch_fails_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let http = http(&["a", "b"]);
        let inputs = vec![
            "https://clips.test/v/a".to_string(),
            "https://clips.test/v/b".to_string(),
        ];
        let cancel = CancelToken::new();
        cancel.cancel();
        let results = run_batch(&registry(), &http, dir.path(), &inputs, 2, &cancel, false);
        assert!(results
            .iter()
            .all(|r| r.result.as_ref().unwrap_err().kind() == FailureKind::Cancelled));
        assert!(http.requests().is_empty());
    }

    #[test]
    fn fail_fast_cancels_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let http = http(&["a", "b"]);
        let inputs = vec![
            "https://nowhere.test/x".to_string(),
            "https://clips.test/v/a".to_string(),
            "https://clips.test/v/b".to_string(),
        ];
        let cancel = CancelToken::new();
        let results = run_batch(&registry(), &http, dir.path(), &inputs, 1, &cancel, true);

        assert!(cancel.is_cancelled());
        let kinds: Vec<FailureKind> = results
            .iter()
            .map(|r| r.result.as_ref().unwrap_err().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![FailureKind::Unsupported, FailureKind::Cancelled, FailureKind::Cancelled]
        );
        assert!(http.requests().is_empty());
    }

    #[test]
    fn without_fail_fast_a_failure_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let http = http(&["a"]);
        let inputs = vec![
            "https://nowhere.test/x".to_string(),
            "https://clips.test/v/a".to_string(),
        ];
        let cancel = CancelToken::new();
        let results = run_batch(&registry(), &http, dir.path(), &inputs, 1, &cancel, false);
        assert!(!cancel.is_cancelled());
        assert!(results[1].result.is_ok());
    }
}
