//! Tenant resolution middleware: the first label of the request host names the tenant.

use crate::error::{AppError, TenantError};
use crate::extractors::tenant::TenantContext;
use axum::{
    extract::Request,
    http::header::HOST,
    middleware::Next,
    response::Response,
};

/// Attach a [`TenantContext`] derived from the Host header, then run the rest of the pipeline.
///
/// The name is not checked against the registry here; an unknown tenant fails later, when a
/// handler asks for the tenant database.
pub async fn resolve_tenant(mut request: Request, next: Next) -> Result<Response, AppError> {
    let name = match request_host(&request).map(tenant_name_from_host) {
        Some(Ok(name)) => name.to_string(),
        Some(Err(e)) => {
            tracing::warn!(host = ?request_host(&request), "rejecting request with malformed host");
            return Err(e.into());
        }
        None => {
            tracing::warn!("rejecting request without host");
            return Err(TenantError::MalformedHost.into());
        }
    };
    request.extensions_mut().insert(TenantContext::new(name));
    Ok(next.run(request).await)
}

/// Host header, or the URI authority for HTTP/2 requests that carry none.
fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.host()))
}

/// `acme.example.com` -> `acme`; `localhost` -> `localhost`; `acme.example.com:8080` -> `acme`.
pub fn tenant_name_from_host(host: &str) -> Result<&str, TenantError> {
    let host = strip_port(host.trim());
    let name = host.split('.').next().unwrap_or_default();
    if name.is_empty() {
        return Err(TenantError::MalformedHost);
    }
    Ok(name)
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_label_is_tenant() {
        assert_eq!(tenant_name_from_host("acme.example.com").unwrap(), "acme");
        assert_eq!(tenant_name_from_host("beta.forum.example.org").unwrap(), "beta");
    }

    #[test]
    fn host_without_dot_is_whole_host() {
        assert_eq!(tenant_name_from_host("localhost").unwrap(), "localhost");
    }

    #[test]
    fn port_is_ignored() {
        assert_eq!(tenant_name_from_host("acme.example.com:8080").unwrap(), "acme");
        assert_eq!(tenant_name_from_host("localhost:3000").unwrap(), "localhost");
    }

    #[test]
    fn case_is_preserved() {
        assert_eq!(tenant_name_from_host("Acme.example.com").unwrap(), "Acme");
    }

    #[test]
    fn empty_hosts_are_malformed() {
        for host in ["", "   ", ".example.com", ":8080"] {
            assert!(
                matches!(tenant_name_from_host(host), Err(TenantError::MalformedHost)),
                "{host:?}"
            );
        }
    }
}
