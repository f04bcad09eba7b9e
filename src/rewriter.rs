use std::path::{Path, PathBuf};

use crate::sdk::xcode_developer_dir;

/// Outcome of rewriting one action's argument vector.
#[derive(Debug, Clone, Default)]
pub struct RewriteResult {
    pub arguments: Vec<String>,
    /// Path-shaped tokens and whether they exist on disk. Collected for
    /// future diagnostics only; never exposed on `BazelTarget` (spec §4.5).
    pub path_validity: Vec<(String, bool)>,
}

/// Rewrites `args` into a form the indexer can execute directly, applying
/// the ten ordered rules of spec §4.5 with an explicit cursor: the first
/// matching rule per token consumes one or two tokens and advances.
pub fn rewrite_arguments(args: &[String], execroot: &str, sdk: &Path) -> RewriteResult {
    let mut result = RewriteResult::default();
    let mut i = 0;

    while i < args.len() {
        let token = &args[i];

        // 1. Drop wrapper tokens.
        if token.contains("-Xwrapped-swift")
            || token.ends_with("worker")
            || token.starts_with("swiftc")
            || token.contains("wrapped_clang")
        {
            i += 1;
            continue;
        }

        // 2. Execution-root placeholder.
        if token.contains("__BAZEL_EXECUTION_ROOT__") {
            let rewritten = token.replace("__BAZEL_EXECUTION_ROOT__", execroot);
            emit(&mut result, rewritten);
            i += 1;
            continue;
        }

        // 3. Drop batch mode.
        if token.contains("-enable-batch-mode") {
            i += 1;
            continue;
        }

        // 4. Drop index-store-path pair.
        if token.contains("-index-store-path") {
            if let Some(next) = args.get(i + 1) {
                if next.contains("indexstore") {
                    i += 2;
                    continue;
                }
            }
        }

        // 5. Drop const-gather-protocols pair.
        if token.contains("-Xfrontend") {
            if let Some(next) = args.get(i + 1) {
                if next.contains("-const-gather-protocols-file")
                    || next.contains("const_protocols_to_gather.json")
                {
                    i += 2;
                    continue;
                }
            }
        }

        // 6. SDK placeholder.
        if token.contains("__BAZEL_XCODE_SDKROOT__") {
            let rewritten = token.replace("__BAZEL_XCODE_SDKROOT__", &sdk.to_string_lossy());
            emit(&mut result, rewritten);
            i += 1;
            continue;
        }

        // 7. Xcode developer-dir placeholder.
        if token.contains("__BAZEL_XCODE_DEVELOPER_DIR__/") {
            let rewritten = token.replace(
                "__BAZEL_XCODE_DEVELOPER_DIR__/",
                &format!("{}/", xcode_developer_dir()),
            );
            result.arguments.push(rewritten);
            i += 1;
            continue;
        }

        // 8. Rewrite bazel-out/ prefix.
        if token.contains("bazel-out/") {
            let rewritten = token.replace("bazel-out/", &format!("{}/bazel-out/", execroot));
            emit(&mut result, rewritten);
            i += 1;
            continue;
        }

        // 9. Rewrite external/ prefix.
        if token.contains("external/") {
            let rewritten = token.replace("external/", &format!("{}/external/", execroot));
            emit(&mut result, rewritten);
            i += 1;
            continue;
        }

        // 10. Default.
        emit(&mut result, token.clone());
        i += 1;
    }

    result
}

fn emit(result: &mut RewriteResult, token: String) {
    if let Some(validated) = path_suffix(&token) {
        let exists = Path::new(&validated).exists();
        result.path_validity.push((validated, exists));
    }
    result.arguments.push(token);
}

/// A token is path-shaped if it contains `/` and does not start with `-`;
/// `-I<p>`/`-F<p>` have their path suffix extracted instead.
fn path_suffix(token: &str) -> Option<String> {
    if let Some(suffix) = token.strip_prefix("-I").or_else(|| token.strip_prefix("-F")) {
        if suffix.contains('/') {
            return Some(suffix.to_string());
        }
        return None;
    }

    if token.contains('/') && !token.starts_with('-') {
        return Some(token.to_string());
    }

    None
}

pub fn absolute_execroot_path(execroot: &str, relative: &str) -> PathBuf {
    Path::new(execroot).join(relative)
}
