use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::action_processor::{as_value_set, process_actions, BazelTarget};
use crate::cache::{cache_key, BazelTargetCache};
use crate::error::{EngineError, EngineResult};
use crate::graph::ActionGraph;
use crate::logging::Logger;
use crate::process;

type PipelineFuture = Pin<Box<dyn Future<Output = EngineResult<Vec<BazelTarget>>> + Send>>;

/// Orchestrates the query → decode → process → cache → deliver pipeline
/// (spec §4.8).
pub struct Engine {
    cache: Arc<BazelTargetCache>,
    logger: Arc<dyn Logger>,
}

impl Engine {
    pub fn new(cache: Arc<BazelTargetCache>, logger: Arc<dyn Logger>) -> Self {
        Self { cache, logger }
    }

    /// Computes the cache key, serves a stale hit immediately (spawning a
    /// background refresh that re-notifies only on a set-inequal result),
    /// or runs the fresh pipeline synchronously on a miss.
    pub async fn execute<F>(
        &self,
        labels: Vec<String>,
        workspace_root: PathBuf,
        execroot: String,
        aquery_args: Vec<String>,
        completion: F,
    ) -> EngineResult<()>
    where
        F: Fn(Vec<BazelTarget>) + Send + Sync + 'static,
    {
        let logger = self.logger.clone();
        self.execute_with_pipeline(
            labels,
            completion,
            move |labels, aquery_args| {
                let workspace_root = workspace_root.clone();
                let execroot = execroot.clone();
                let logger = logger.clone();
                Box::pin(async move {
                    run_fresh_pipeline(&labels, &workspace_root, &execroot, &aquery_args, &*logger)
                        .await
                })
            },
            aquery_args,
        )
        .await
    }

    /// Same cache protocol as [`Engine::execute`], but with the "fresh
    /// pipeline" step passed in as a closure so it can be exercised
    /// without shelling out to a real `bazel` binary (spec §8 scenarios 3
    /// and 4: cache hit with identical vs. changed refresh).
    pub async fn execute_with_pipeline<F, P>(
        &self,
        labels: Vec<String>,
        completion: F,
        pipeline: P,
        aquery_args: Vec<String>,
    ) -> EngineResult<()>
    where
        F: Fn(Vec<BazelTarget>) + Send + Sync + 'static,
        P: Fn(Vec<String>, Vec<String>) -> PipelineFuture + Send + Sync + 'static,
    {
        let key = cache_key(&labels);

        if let Some(stale) = self.cache.load(&key) {
            completion(stale.clone());

            let cache = self.cache.clone();
            let logger = self.logger.clone();
            let pipeline = Arc::new(pipeline);
            tokio::spawn(async move {
                match pipeline(labels, aquery_args).await {
                    Ok(fresh) => {
                        if let Err(e) = cache.save(key.clone(), fresh.clone()).await {
                            logger.error(&format!(
                                "background refresh: failed to save cache: {}",
                                e
                            ));
                        }
                        if as_value_set(&fresh) != as_value_set(&stale) {
                            completion(fresh);
                        }
                    }
                    Err(e) => {
                        logger.error(&format!(
                            "background refresh failed, cache unchanged: {}",
                            e
                        ));
                    }
                }
            });

            return Ok(());
        }

        let fresh = pipeline(labels, aquery_args).await?;
        self.cache.save(key, fresh.clone()).await?;
        completion(fresh);
        Ok(())
    }
}

async fn run_fresh_pipeline(
    labels: &[String],
    workspace_root: &PathBuf,
    execroot: &str,
    aquery_args: &[String],
    logger: &dyn Logger,
) -> EngineResult<Vec<BazelTarget>> {
    run_fresh_pipeline_with_executable("bazel", labels, workspace_root, execroot, aquery_args, logger)
        .await
}

/// `run_fresh_pipeline` with the bazel executable name parameterized, so
/// tests can exercise the empty-stdout-is-fatal branch without a real
/// `bazel` on `$PATH`.
async fn run_fresh_pipeline_with_executable(
    executable: &str,
    labels: &[String],
    workspace_root: &PathBuf,
    execroot: &str,
    aquery_args: &[String],
    logger: &dyn Logger,
) -> EngineResult<Vec<BazelTarget>> {
    let label_set = labels.join(" ");
    let expression = format!(
        "mnemonic(\"SwiftCompile|ObjcCompile\", deps(set({})))",
        label_set
    );

    let mut args: Vec<String> = vec![
        "aquery".to_string(),
        expression,
        "--output=jsonproto".to_string(),
    ];
    args.extend(aquery_args.iter().cloned());

    let output = process::run(executable, workspace_root, &args, logger).await;
    if output.stdout.is_empty() {
        return Err(EngineError::custom(format!(
            "bazel aquery produced no output (exit code {}): {}",
            output.exit_code,
            output.stderr_string()
        )));
    }

    let graph = ActionGraph::parse(&output.stdout)?;
    Ok(process_actions(
        &graph,
        &workspace_root.to_string_lossy(),
        execroot,
        logger,
    ))
}
