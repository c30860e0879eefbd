use rocket::{
    http::{Cookie, CookieJar},
    Route,
};

use crate::model::api::{auth::AUTH_TOKEN_COOKIE, response::Message};

use super::common::{ok, ApiResult};

pub fn routes() -> Vec<Route> {
    routes![logout]
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>) -> ApiResult<Message> {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    ok(Message::new("Logged out"))
}
