use std::time::Duration;

/// Pre-upload (session negotiation) endpoint.
pub const PREUPLOAD_URL: &str = "https://member.bilibili.com/preupload";

/// Account info endpoint used to check that a cookie is still valid.
pub const NAV_URL: &str = "https://api.bilibili.com/x/web-interface/nav";

/// Cover image upload endpoint.
pub const COVER_UPLOAD_URL: &str = "https://member.bilibili.com/x/vu/web/cover/up";

/// Publish (submission) endpoint.
pub const PUBLISH_URL: &str = "https://member.bilibili.com/x/vu/web/add/v3";

/// Origin/Referer sent with the finalize request.
pub const MEMBER_ORIGIN: &str = "https://member.bilibili.com";

/// Scheme prefixed to the scheme-relative endpoint returned by pre-upload.
pub const DEFAULT_UPLOAD_SCHEME: &str = "https";

/// Upload profile for regular video uploads.
pub const UPLOAD_PROFILE: &str = "ugcupos/bup";

/// Upload profile for metadata uploads.
pub const META_PROFILE: &str = "fxmeta/bup";

/// Client version reported to the pre-upload endpoint.
pub const CLIENT_VERSION: &str = "2.11.0";

/// Client build reported to the pre-upload endpoint.
pub const CLIENT_BUILD: &str = "2110000";

/// Header carrying the session authorization token.
pub const UPOS_AUTH_HEADER: &str = "X-Upos-Auth";

/// Browser user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/105.0.0.0 Safari/537.36 Edg/105.0.1343.53";

/// Placeholder part tag accepted by the finalize endpoint when the chunk
/// response carries no `ETag`.
pub const PLACEHOLDER_ETAG: &str = "etag";

/// Name of the cookie holding the CSRF token.
pub const CSRF_COOKIE: &str = "bili_jct";

/// Description format id sent with every publish request.
pub const DESC_FORMAT_ID: i64 = 16;

/// Timeout used when fetching a remote cover image.
pub const COVER_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
