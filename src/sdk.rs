use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};
use crate::graph::Action;

const XCODE_DEVELOPER_DIR: &str = "/Applications/Xcode.app/Contents/Developer";

/// Picks the Apple SDK path substituted for `__BAZEL_XCODE_SDKROOT__`,
/// based on the action's `APPLE_SDK_PLATFORM` environment entry.
///
/// Hard-coded to Xcode's default layout; a more robust implementation
/// would shell out to `xcode-select -p` / `xcrun --sdk <p> --show-sdk-path`
/// instead (spec §9), but this revision keeps the original's fixed paths.
pub fn select_sdk(action: &Action) -> EngineResult<PathBuf> {
    let platform = action
        .env("APPLE_SDK_PLATFORM")
        .ok_or_else(|| EngineError::custom("action environment lacks APPLE_SDK_PLATFORM"))?;

    let sdk_platform = if platform == "iPhoneSimulator" {
        "iPhoneSimulator"
    } else {
        "MacOSX"
    };

    Ok(PathBuf::from(format!(
        "{}/Platforms/{}.platform/Developer/SDKs/{}.sdk",
        XCODE_DEVELOPER_DIR, sdk_platform, sdk_platform
    )))
}

pub fn xcode_developer_dir() -> &'static str {
    XCODE_DEVELOPER_DIR
}
