//! TLS trust configuration for the transport.
//!
//! Native root certificates are loaded once and cached to avoid repeated OS
//! certificate store lookups. A PEM bundle can be loaded instead for requests
//! that pin the service's certificate authority.

use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Cached native root certificates.
/// Always stores Ok; empty vec means no certs found (warned, not errored).
static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_certs_inner() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();

    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    let certs: Vec<CertificateDer<'static>> = result.certs;

    if certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = certs.len(), "loaded native root certificates");
    }

    certs
}

/// Get cached native root certificates (may be empty).
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE
        .get_or_init(load_native_certs_inner)
        .as_slice()
}

/// Get the crypto provider for TLS connections.
///
/// Uses the process-wide default provider when one is installed, otherwise
/// an aws-lc-rs provider that is not installed globally.
pub fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build a rustls `ClientConfig` trusting the cached native roots.
///
/// # Errors
///
/// Returns an error if the OS store is empty or none of its certificates parse.
pub fn native_roots_client_config() -> Result<rustls::ClientConfig, String> {
    client_config_from_roots(native_root_certs().iter().cloned(), "native root")
}

/// Build a rustls `ClientConfig` trusting only the CA certificates in the
/// PEM bundle at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, contains malformed PEM, or
/// holds no usable certificate.
pub fn ca_bundle_client_config(path: &Path) -> Result<rustls::ClientConfig, String> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| format!("failed to read CA bundle '{}': {e}", path.display()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("malformed CA bundle '{}': {e}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        count = certs.len(),
        "loaded CA bundle"
    );

    client_config_from_roots(certs, "CA bundle")
}

fn client_config_from_roots(
    certs: impl IntoIterator<Item = CertificateDer<'static>>,
    source: &str,
) -> Result<rustls::ClientConfig, String> {
    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs);

    if ignored > 0 {
        tracing::warn!(
            added = added,
            ignored = ignored,
            source,
            "some root certificates could not be parsed"
        );
    }

    if added == 0 {
        return Err(format!(
            "no valid {source} CA certificates found ({ignored} failed to parse)"
        ));
    }

    rustls::ClientConfig::builder_with_provider(get_crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("failed to set TLS protocol versions: {e}"))
        .map(|builder| {
            builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::Ordering;

    /// Verifies "at most one load": `LOAD_COUNT` is shared with parallel tests
    /// that may have initialized the cache first.
    #[test]
    fn test_native_roots_cached() {
        let initial_count = LOAD_COUNT.load(Ordering::SeqCst);

        let result1 = native_root_certs();
        let result2 = native_root_certs();

        let final_count = LOAD_COUNT.load(Ordering::SeqCst);
        assert!(final_count <= initial_count + 1);
        assert!(std::ptr::eq(result1, result2), "should return same slice");
    }

    #[test]
    fn test_ca_bundle_missing_file() {
        let err = ca_bundle_client_config(Path::new("/nonexistent/ca-bundle.pem")).unwrap_err();
        assert!(err.contains("failed to read CA bundle"), "got: {err}");
    }

    #[test]
    fn test_ca_bundle_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();

        let err = ca_bundle_client_config(file.path()).unwrap_err();
        assert!(err.contains("no valid CA bundle"), "got: {err}");
    }

    #[test]
    fn test_ca_bundle_from_native_roots() {
        // Round-trip a couple of OS roots through PEM; skipped on hosts
        // without a native store.
        let certs = native_root_certs();
        if certs.is_empty() {
            return;
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        for cert in certs.iter().take(2) {
            let encoded = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                cert.as_ref(),
            );
            writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
            for chunk in encoded.as_bytes().chunks(64) {
                writeln!(file, "{}", std::str::from_utf8(chunk).unwrap()).unwrap();
            }
            writeln!(file, "-----END CERTIFICATE-----").unwrap();
        }

        assert!(ca_bundle_client_config(file.path()).is_ok());
    }
}
