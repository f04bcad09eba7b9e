use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{stdin, stdout, BufReader};

use bazel_sourcekit_bsp::adapter::TargetRegistry;
use bazel_sourcekit_bsp::bsp::BspServer;
use bazel_sourcekit_bsp::cache::BazelTargetCache;
use bazel_sourcekit_bsp::config::ServerConfig;
use bazel_sourcekit_bsp::engine::Engine;
use bazel_sourcekit_bsp::logging::{Logger, TracingLogger};
use bazel_sourcekit_bsp::process;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    logger.info("starting bazel-sourcekit-bsp");

    let workspace_root = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            logger.error(&format!("failed to determine workspace root: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let config = match ServerConfig::load(&workspace_root) {
        Ok(c) => c,
        Err(e) => {
            logger.error(&format!("failed to load buildServer.json: {}", e));
            return ExitCode::FAILURE;
        }
    };

    // A failed `bazel info execution_root` is fatal to the server (spec §7).
    let execroot_output =
        process::run("bazel", &workspace_root, ["info", "execution_root"], &*logger).await;
    if execroot_output.exit_code != 0 {
        logger.error(&format!(
            "bazel info execution_root failed: {}",
            execroot_output.stderr_string()
        ));
        return ExitCode::FAILURE;
    }
    let execroot = execroot_output.stdout_string().trim().to_string();

    let cache = match BazelTargetCache::open() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            logger.error(&format!("failed to open cache: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let engine = Arc::new(Engine::new(cache, logger.clone()));
    let registry = Arc::new(TargetRegistry::new());

    let server = BspServer {
        config,
        workspace_root,
        execroot,
        registry: registry.clone(),
        engine: engine.clone(),
        logger: logger.clone(),
    };

    // Kick off the initial target-list population; `workspace/buildTargets`
    // and friends serve whatever the registry holds in the meantime.
    {
        let labels = server.config.targets.clone();
        let aquery_args = server.config.aquery_args.clone();
        let workspace_root = server.workspace_root.clone();
        let execroot = server.execroot.clone();
        let engine = engine.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            let registry_for_completion = registry.clone();
            let result = engine
                .execute(labels, workspace_root, execroot, aquery_args, move |targets| {
                    let registry = registry_for_completion.clone();
                    tokio::spawn(async move {
                        registry.replace(targets).await;
                    });
                })
                .await;
            if let Err(e) = result {
                tracing::error!("initial target query failed: {}", e);
            }
        });
    }

    let stdin = stdin();
    let stdout = stdout();
    let mut reader = BufReader::new(stdin);
    let mut writer = stdout;

    loop {
        match BspServer::read_message(&mut reader).await {
            Ok(Some(message)) => {
                if let Some(reply) = server.dispatch(message).await {
                    if let Err(e) = BspServer::write_message(&mut writer, &reply).await {
                        tracing::error!("failed to write BSP response: {}", e);
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read BSP message: {}", e);
                break;
            }
        }
    }

    ExitCode::SUCCESS
}
