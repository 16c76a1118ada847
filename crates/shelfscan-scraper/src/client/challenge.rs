//! Detection of interstitial bot-challenge pages served with a 2xx status.

/// Whether `body` is an anti-bot interstitial rather than the requested page.
///
/// Such pages come back as `200 OK` but never contain product data, and
/// requesting again returns the same page.
pub(super) fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");
    let has_robot_check = lowered.contains("enter the characters you see below")
        || lowered.contains("/errors/validatecaptcha");

    has_cloudflare_banner
        || has_challenge_platform
        || has_robot_check
        || (has_just_a_moment && has_cookie_gate)
        || (has_just_a_moment && has_cf_chl)
}
