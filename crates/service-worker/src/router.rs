use http::{Method, Uri};
use shared::model::{RouteClass, WorkerConfig};

/// Picks the handling for a request. First match wins:
///
/// 1. non-GET or non-http(s) scheme: not intercepted
/// 2. path contains a monitored pattern (`/api/`, `/dashboard`, `/admin/`)
/// 3. path is one of the pre-cached static assets
/// 4. everything else
pub fn classify(config: &WorkerConfig, method: &Method, uri: &Uri) -> RouteClass {
    if method != Method::GET || !is_http(uri) {
        return RouteClass::Passthrough;
    }

    let path = uri.path();

    if config
        .monitored_patterns
        .iter()
        .any(|pattern| path.contains(pattern.as_str()))
    {
        RouteClass::Monitored
    } else if config.static_assets.iter().any(|asset| asset == path) {
        RouteClass::StaticAsset
    } else {
        RouteClass::Default
    }
}

// Relative URIs are same origin and so http(s)
fn is_http(uri: &Uri) -> bool {
    uri.scheme_str().map_or(true, |scheme| {
        scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
    })
}
