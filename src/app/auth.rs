use std::cell::RefCell;
use std::rc::Rc;

use serde::Deserialize;

use super::context::AppContext;
use crate::ajax::{Callbacks, RequestError, RequestHandle, RequestOptions};
use crate::storage::{data, delete_data, KeyValueStore};
use crate::util::encode_component;

pub const AUTH_TOKEN_KEY: &str = "auth-token";
pub const ITMS_LINK_KEY: &str = "itms-link";

#[derive(Debug, Deserialize)]
struct AuthReply {
    #[serde(rename = "auth-token")]
    auth_token: Option<String>,
    message: Option<String>,
}

/// Outcome reported to the host: `Err` carries the text shown to the user.
pub type AuthResult = Result<(), String>;

impl AppContext {
    /// Appends the session auth token to an outgoing URL, if there is one.
    pub fn decorate_request_url(&self, url: &str) -> String {
        match data(self.session(), AUTH_TOKEN_KEY, None) {
            Some(token) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}auth-token={token}")
            }
            None => url.to_string(),
        }
    }

    pub fn authenticate(
        &self,
        auth_url: &str,
        username: &str,
        password: &str,
        callback: impl FnOnce(AuthResult) + 'static,
    ) -> Result<RequestHandle, RequestError> {
        let url = format!(
            "{auth_url}?username={}&password={}",
            encode_component(username),
            encode_component(password)
        );
        tracing::info!(target: "app", username, "authenticating");

        let callback = Rc::new(RefCell::new(Some(callback)));
        let on_success = Rc::clone(&callback);
        let session = self.clone();
        let hooks = Callbacks::new()
            .on_success(move |response| {
                let outcome = match response.json::<AuthReply>() {
                    Ok(AuthReply {
                        auth_token: Some(token),
                        ..
                    }) => {
                        if let Err(err) = session.session().set(AUTH_TOKEN_KEY, &token) {
                            tracing::error!(target: "app", error = %err, "failed to store auth token");
                        }
                        Ok(())
                    }
                    Ok(reply) => Err(reply.message.unwrap_or_default()),
                    Err(err) => Err(format!(
                        "Caught exception while processing request. Aborting. Exception: {err}"
                    )),
                };
                if let Some(callback) = on_success.borrow_mut().take() {
                    callback(outcome);
                }
            })
            .on_failure(move |status, response| {
                if let Some(callback) = callback.borrow_mut().take() {
                    callback(Err(format!(
                        "Auth failed. Status {status}: {}",
                        response.status_text
                    )));
                }
            });

        self.requests().issue(RequestOptions::new(url), hooks)
    }

    /// Drops all per-user data in both scopes.
    pub fn logout(&self) {
        tracing::info!(target: "app", "logged out, clearing storage");
        if let Err(err) = self.session().clear() {
            tracing::warn!(target: "app", error = %err, "failed to clear session storage");
        }
        if let Err(err) = self.device().clear() {
            tracing::warn!(target: "app", error = %err, "failed to clear device storage");
        }
    }

    pub fn itms_link(&self) -> Option<String> {
        data(self.device(), ITMS_LINK_KEY, None)
    }

    pub fn forget_itms_link(&self) {
        delete_data(self.device(), ITMS_LINK_KEY);
    }
}
