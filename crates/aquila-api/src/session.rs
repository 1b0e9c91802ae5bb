// Hub session and maintenance endpoints
//
// Token login bypasses the interceptor: there is no session to decorate
// yet, and a rejected login must not be mistaken for an expired session.

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::{HubClient, decode, read_body};
use crate::error::Error;
use crate::models::{TokenRequest, TokenResponse};
use crate::transport::JSON_CONTENT_TYPE;

impl HubClient {
    /// Exchange a user name and password for a bearer token.
    ///
    /// `POST token` with `{ "user", "password" }`.
    pub async fn request_token(
        &self,
        user: &str,
        password: &SecretString,
    ) -> Result<SecretString, Error> {
        let url = self.endpoint(&["token"])?;
        debug!(user, "requesting token");

        let body = TokenRequest {
            user,
            password: password.expose_secret(),
        };

        let resp = self
            .http()
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let text = match read_body(resp).await {
            Ok(text) => text,
            Err(Error::Unauthorized) => {
                return Err(Error::Authentication {
                    message: "invalid user or password".into(),
                });
            }
            Err(Error::Status { status, body }) => {
                return Err(Error::Authentication {
                    message: format!("login failed (HTTP {status}): {body}"),
                });
            }
            Err(e) => return Err(e),
        };

        let parsed: TokenResponse = decode(&text)?;
        if parsed.success == Some(false) {
            return Err(Error::Authentication {
                message: parsed.message.unwrap_or_else(|| "login rejected".into()),
            });
        }

        match parsed.token {
            Some(token) if !token.is_empty() => {
                debug!("token issued");
                Ok(SecretString::from(token))
            }
            _ => Err(Error::Authentication {
                message: "hub response did not contain a token".into(),
            }),
        }
    }

    /// Ask the hub to reload its configuration.
    ///
    /// `GET reload`
    pub async fn reload(&self) -> Result<(), Error> {
        let url = self.endpoint(&["reload"])?;
        debug!("requesting hub reload");
        self.call_unit(self.http().get(url)).await
    }

    /// Ask the hub to re-probe for devices.
    ///
    /// `GET discover`
    pub async fn discover(&self) -> Result<(), Error> {
        let url = self.endpoint(&["discover"])?;
        debug!("requesting hub discovery");
        self.call_unit(self.http().get(url)).await
    }
}
