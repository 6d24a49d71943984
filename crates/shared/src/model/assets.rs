use const_format::concatcp;

const ANDROID_ICON_DIR: &str = "/android/";

pub const FAVICON: &str = "/favicon.ico";

/// Assets pre-cached on install and served cache-first afterwards
pub const STATIC_ASSETS: [&str; 7] = [
    FAVICON,
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-48-48.png"),
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-72-72.png"),
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-96-96.png"),
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-144-144.png"),
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-192-192.png"),
    concatcp!(ANDROID_ICON_DIR, "android-launchericon-512-512.png"),
];

/// Path fragments that mark a request as live data worth monitoring
pub const MONITORED_PATH_PATTERNS: [&str; 3] = ["/api/", "/dashboard", "/admin/"];

pub fn default_static_assets() -> Vec<String> {
    STATIC_ASSETS.iter().map(|v| v.to_string()).collect()
}

pub fn default_monitored_patterns() -> Vec<String> {
    MONITORED_PATH_PATTERNS.iter().map(|v| v.to_string()).collect()
}
