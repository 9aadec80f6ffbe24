//! Concurrent discovery of resource identifiers.
//!
//! One task per resource kind, bounded by a semaphore and joined at a single
//! barrier. Per-kind failures are collected; a malformed include filter fails
//! the whole run before anything is launched.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future;
use glob::{MatchOptions, Pattern};
use tokio::sync::{Semaphore, watch};

use crate::generate::error::{GenerateError, GenerateResult};
use crate::generate::result::{GenerationResult, ResourceSuccess};
use crate::registry::{ListerContext, Registry};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob patterns over `kind.identifier`. No patterns means everything matches.
#[derive(Debug, Clone, Default)]
pub struct IncludeFilter {
    patterns: Vec<Pattern>,
}

impl IncludeFilter {
    pub fn new(patterns: &[String]) -> GenerateResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| GenerateError::InvalidFilter {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<GenerateResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn matches(&self, kind: &str, id: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let address = format!("{}.{}", kind, id);
        self.patterns
            .iter()
            .any(|p| p.matches_with(&address, MATCH_OPTIONS))
    }
}

/// Sorted, deduplicated identifiers of one kind
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredKind {
    pub kind: String,
    pub ids: Vec<String>,
}

/// Fan-in of one discovery run
#[derive(Debug, Default)]
pub struct Discovered {
    pub kinds: Vec<DiscoveredKind>,
    pub result: GenerationResult,
}

impl Discovered {
    pub fn is_empty(&self) -> bool {
        self.kinds.iter().all(|k| k.ids.is_empty())
    }
}

/// Discovery settings for one provider scope
pub struct DiscoveryOptions {
    pub filter: IncludeFilter,
    pub concurrency: usize,
    pub cancel: watch::Receiver<bool>,
}

enum TaskOutcome {
    Found(DiscoveredKind),
    Failed { kind: String, error: GenerateError },
}

/// Run every discovery function of `registry` and collect the results
pub async fn discover_all(
    registry: &Registry,
    ctx: Arc<ListerContext>,
    options: DiscoveryOptions,
) -> GenerateResult<Discovered> {
    let DiscoveryOptions {
        filter,
        concurrency,
        cancel,
    } = options;

    if *cancel.borrow() {
        return Err(GenerateError::Cancelled);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let filter = Arc::new(filter);
    let mut handles = Vec::new();
    let mut spawned_kinds = Vec::new();
    let mut discovered = Discovered::default();

    for descriptor in registry.list_kinds() {
        let kind = descriptor.name.clone();
        let Some(discover) = descriptor.discover.clone() else {
            discovered.kinds.push(DiscoveredKind {
                kind,
                ids: Vec::new(),
            });
            continue;
        };

        let semaphore = semaphore.clone();
        let filter = filter.clone();
        let ctx = ctx.clone();

        spawned_kinds.push(kind.clone());
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return TaskOutcome::Failed {
                        kind,
                        error: GenerateError::Discovery {
                            resource: String::new(),
                            message: e.to_string(),
                        },
                    };
                }
            };

            match discover(ctx).await {
                Ok(ids) => {
                    let ids = ids
                        .into_iter()
                        .filter(|id| filter.matches(&kind, id))
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect();
                    TaskOutcome::Found(DiscoveredKind { kind, ids })
                }
                Err(error) => TaskOutcome::Failed { kind, error },
            }
        }));
    }

    let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let joined = tokio::select! {
        joined = future::join_all(handles) => joined,
        _ = cancelled(cancel) => {
            for handle in abort_handles {
                handle.abort();
            }
            return Err(GenerateError::Cancelled);
        }
    };

    for (spawned_kind, outcome) in spawned_kinds.into_iter().zip(joined) {
        match outcome {
            Ok(TaskOutcome::Found(kind)) => discovered.kinds.push(kind),
            Ok(TaskOutcome::Failed { kind, error }) => {
                let error = match error {
                    GenerateError::Discovery { message, .. } => GenerateError::Discovery {
                        resource: kind.clone(),
                        message,
                    },
                    other => GenerateError::Discovery {
                        resource: kind.clone(),
                        message: other.to_string(),
                    },
                };
                discovered.result.push_non_critical(&kind, error);
            }
            Err(e) => discovered.result.push_non_critical(
                &spawned_kind,
                GenerateError::Discovery {
                    resource: spawned_kind.clone(),
                    message: format!("Task panicked: {}", e),
                },
            ),
        }
    }

    discovered.kinds.sort_by(|a, b| a.kind.cmp(&b.kind));
    discovered.result.successes = discovered
        .kinds
        .iter()
        .map(|k| ResourceSuccess {
            kind: k.kind.clone(),
            blocks: k.ids.len(),
        })
        .collect();

    Ok(discovered)
}

/// Resolves once the cancellation flag is raised
pub async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone, nobody can cancel any more
            future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::client::MockApiClient;
    use crate::registry::identifier::{IdField, IdFormat};
    use crate::registry::{Category, ResourceDescriptor};
    use std::time::Duration;

    fn descriptor(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(
            Category::GrafanaOss,
            name,
            IdFormat::new(vec![IdField::string("id")]),
        )
    }

    fn context() -> Arc<ListerContext> {
        Arc::new(ListerContext::new(Arc::new(MockApiClient::new()), true, None))
    }

    fn options(patterns: &[&str]) -> (DiscoveryOptions, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        (
            DiscoveryOptions {
                filter: IncludeFilter::new(&patterns).unwrap(),
                concurrency: 2,
                cancel: rx,
            },
            tx,
        )
    }

    fn fixed(ids: &'static [&'static str]) -> impl Fn(Arc<ListerContext>) -> future::Ready<GenerateResult<Vec<String>>> {
        move |_| future::ready(Ok(ids.iter().map(|id| id.to_string()).collect()))
    }

    #[tokio::test]
    async fn test_duplicates_are_removed() {
        let registry = Registry::new(vec![descriptor("stack").with_discover(fixed(&["b", "a", "a"]))]);
        let (options, _tx) = options(&[]);

        let discovered = discover_all(&registry, context(), options).await.unwrap();

        assert_eq!(discovered.kinds[0].ids, vec!["a", "b"]);
        assert_eq!(discovered.result.blocks(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_sorted() {
        let registry = Registry::new(vec![
            descriptor("zeta").with_discover(fixed(&["1"])),
            descriptor("broken").with_discover(|_| {
                future::ready(Err::<Vec<String>, _>(GenerateError::Api(
                    "403 Forbidden".to_string(),
                )))
            }),
            descriptor("alpha"),
        ]);
        let (options, _tx) = options(&[]);

        let discovered = discover_all(&registry, context(), options).await.unwrap();

        let kinds: Vec<&str> = discovered.kinds.iter().map(|k| k.kind.as_str()).collect();
        assert_eq!(kinds, vec!["alpha", "zeta"]);
        assert!(discovered.kinds[0].ids.is_empty());
        assert_eq!(discovered.result.errors.len(), 1);
        assert!(!discovered.result.has_critical());
        assert_eq!(
            discovered.result.errors[0].to_string(),
            "broken: Failed to discover broken resources: API error: 403 Forbidden"
        );
    }

    #[tokio::test]
    async fn test_panicked_task_names_its_kind() {
        let registry = Registry::new(vec![
            descriptor("exploding").with_discover(|_| async {
                if true {
                    panic!("discovery exploded");
                }
                Ok::<_, GenerateError>(Vec::new())
            }),
            descriptor("stack").with_discover(fixed(&["a"])),
        ]);
        let (options, _tx) = options(&[]);

        let discovered = discover_all(&registry, context(), options).await.unwrap();

        assert_eq!(discovered.kinds.len(), 1);
        assert_eq!(discovered.kinds[0].ids, vec!["a"]);
        assert_eq!(discovered.result.errors.len(), 1);
        let message = discovered.result.errors[0].to_string();
        assert!(
            message.starts_with("exploding: Failed to discover exploding resources: Task panicked"),
            "{}",
            message
        );
    }

    #[tokio::test]
    async fn test_include_filter() {
        let registry = Registry::new(vec![
            descriptor("grafana_folder").with_discover(fixed(&["abc", "abd", "x"])),
            descriptor("grafana_team").with_discover(fixed(&["1"])),
        ]);
        let (options, _tx) = options(&["grafana_folder.ab*"]);

        let discovered = discover_all(&registry, context(), options).await.unwrap();

        assert_eq!(discovered.kinds[0].ids, vec!["abc", "abd"]);
        assert!(discovered.kinds[1].ids.is_empty());
    }

    #[test]
    fn test_malformed_filter_is_rejected() {
        let err = IncludeFilter::new(&["grafana_folder.[".to_string()]).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidFilter { ref pattern, .. } if pattern == "grafana_folder.["));
    }

    #[test]
    fn test_filter_wildcard_does_not_cross_separator() {
        let filter = IncludeFilter::new(&["grafana_folder.*".to_string()]).unwrap();
        assert!(filter.matches("grafana_folder", "abc"));
        assert!(!filter.matches("grafana_folder", "a/b"));
        assert!(!filter.matches("grafana_team", "1"));
    }

    #[tokio::test]
    async fn test_cancellation_discards_results() {
        let registry = Registry::new(vec![descriptor("slow").with_discover(|_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, GenerateError>(vec!["late".to_string()])
        })]);
        let (options, tx) = options(&[]);

        let run = tokio::spawn(async move { discover_all(&registry, context(), options).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        assert!(matches!(run.await.unwrap(), Err(GenerateError::Cancelled)));
    }
}
