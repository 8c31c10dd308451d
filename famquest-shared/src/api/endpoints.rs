use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

pub const API_V1_PREFIX: &str = "/api/v1";

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn auth_signup(base: &str) -> String {
    base_join(base, &format!("{}/auth/signup", API_V1_PREFIX))
}
pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_V1_PREFIX))
}
pub fn auth_logout(base: &str) -> String {
    base_join(base, &format!("{}/auth/logout", API_V1_PREFIX))
}
pub fn profile(base: &str) -> String {
    base_join(base, &format!("{}/profile", API_V1_PREFIX))
}
pub fn access(base: &str) -> String {
    base_join(base, &format!("{}/access", API_V1_PREFIX))
}
pub fn children(base: &str) -> String {
    base_join(base, &format!("{}/children", API_V1_PREFIX))
}
pub fn child(base: &str, child_id: &str) -> String {
    base_join(base, &format!("{}/children/{}", API_V1_PREFIX, enc(child_id)))
}
pub fn child_credentials(base: &str, child_id: &str) -> String {
    base_join(
        base,
        &format!("{}/children/{}/credentials", API_V1_PREFIX, enc(child_id)),
    )
}
pub fn child_access(base: &str, child_id: &str) -> String {
    base_join(
        base,
        &format!("{}/children/{}/access", API_V1_PREFIX, enc(child_id)),
    )
}
pub fn settings_api_key(base: &str) -> String {
    base_join(base, &format!("{}/settings/api-key", API_V1_PREFIX))
}
pub fn tutor(base: &str) -> String {
    base_join(base, &format!("{}/tutor", API_V1_PREFIX))
}
