//! Request signing for POS terminals and back-office tools.
//!
//! Terminals sign the raw body of every request with the secret in `SSE_POS_HMAC_SECRET`, and send the base64-encoded
//! HMAC-SHA256 in the [`POS_HMAC_HEADER`] header. Wrap the `/pos` and `/admin` scopes with [`PosSignature`]; requests
//! that fail the check are answered with a 403 and a [`JsonResponse`] body, and never reach the settlement engine.
//!
//! A server without a signing secret refuses every signed scope, rather than accepting signatures made with an empty
//! key.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, InternalError},
    http::header::HeaderValue,
    web,
    Error,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use settlement_common::Secret;
use thiserror::Error;

use crate::{
    config::{PosConfig, POS_HMAC_HEADER},
    data_objects::JsonResponse,
    helpers::verify_hmac,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Request signing is not configured on this server")]
    NotConfigured,
    #[error("The request is not signed")]
    Missing,
    #[error("The request signature is not valid base64")]
    Malformed,
    #[error("The request signature does not match its body")]
    Mismatch,
}

/// Checks the value of the signature header against the request body.
pub fn check_signature(secret: &str, body: &[u8], signature: Option<&HeaderValue>) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::NotConfigured);
    }
    let signature = signature.ok_or(SignatureError::Missing)?;
    let decoded = signature
        .to_str()
        .ok()
        .and_then(|s| base64::decode(s.trim()).ok())
        .ok_or(SignatureError::Malformed)?;
    if verify_hmac(secret, body, &decoded) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Middleware factory. `scope` names the guarded routes in log messages, e.g. "POS" or "back-office".
pub struct PosSignature {
    secret: Secret<String>,
    enabled: bool,
    scope: &'static str,
}

impl PosSignature {
    pub fn new(config: &PosConfig, scope: &'static str) -> Self {
        Self { secret: config.hmac_secret.clone(), enabled: config.hmac_checks, scope }
    }
}

impl<S, B> Transform<S, ServiceRequest> for PosSignature
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = PosSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PosSignatureService {
            secret: self.secret.clone(),
            enabled: self.enabled,
            scope: self.scope,
            service: Rc::new(service),
        }))
    }
}

pub struct PosSignatureService<S> {
    secret: Secret<String>,
    enabled: bool,
    scope: &'static str,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for PosSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let enabled = self.enabled;
        let scope = self.scope;
        Box::pin(async move {
            if !enabled {
                trace!("🔐️ Signature checks are disabled. Passing {scope} request to {} through", req.path());
                return service.call(req).await;
            }
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read the body of a {scope} request to {}. {e:?}", req.path());
                ErrorBadRequest("Could not read the request body")
            })?;
            match check_signature(secret.reveal(), body.as_ref(), req.headers().get(POS_HMAC_HEADER)) {
                Ok(()) => {
                    trace!("🔐️ {scope} request to {} is signed ✅️", req.path());
                    req.set_payload(bytes_to_payload(body));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Refusing {scope} request to {}. {e}", req.path());
                    Err(refusal(e))
                },
            }
        })
    }
}

fn refusal(e: SignatureError) -> Error {
    InternalError::from_response(e, HttpResponse::Forbidden().json(JsonResponse::failure(e))).into()
}

/// Puts the body back, so that the route's extractors can read it.
fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::helpers::calculate_hmac;

    const BODY: &[u8] = br#"{"sale_id": "POS-1"}"#;

    #[test]
    fn signatures_are_checked_against_the_body() {
        let good = HeaderValue::from_str(&calculate_hmac("till-key", BODY)).unwrap();
        assert_eq!(check_signature("till-key", BODY, Some(&good)), Ok(()));
        assert_eq!(check_signature("till-key", br#"{"sale_id": "POS-2"}"#, Some(&good)), Err(SignatureError::Mismatch));
        assert_eq!(check_signature("other-key", BODY, Some(&good)), Err(SignatureError::Mismatch));
    }

    #[test]
    fn unusable_signatures_are_refused() {
        assert_eq!(check_signature("till-key", BODY, None), Err(SignatureError::Missing));
        let garbage = HeaderValue::from_static("not base64!");
        assert_eq!(check_signature("till-key", BODY, Some(&garbage)), Err(SignatureError::Malformed));
    }

    #[test]
    fn an_empty_secret_refuses_everything() {
        let signed_with_empty_key = HeaderValue::from_str(&calculate_hmac("", BODY)).unwrap();
        assert_eq!(check_signature("", BODY, Some(&signed_with_empty_key)), Err(SignatureError::NotConfigured));
    }
}
