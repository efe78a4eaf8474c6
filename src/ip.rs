/// Client address extraction for the search throttle.
///
/// The API is expected to sit behind a reverse proxy that overwrites
/// `X-Forwarded-For` / `X-Real-IP`. Those headers are trusted as-is, so a
/// deployment without such a proxy lets clients pick their own throttle key.
use actix_web::HttpRequest;
use std::net::IpAddr;

/// The parsed address in `header`, taking the first entry of a list.
fn forwarded_ip(req: &HttpRequest, header: &str) -> Option<String> {
    let value = req.headers().get(header)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    first.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Address used as the rate-limit key: `X-Forwarded-For`, then `X-Real-IP`,
/// then the socket peer.
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    forwarded_ip(req, "x-forwarded-for")
        .or_else(|| forwarded_ip(req, "x-real-ip"))
        .or_else(|| req.peer_addr().map(|peer| peer.ip().to_string()))
}
