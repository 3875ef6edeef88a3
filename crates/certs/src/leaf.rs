use std::sync::Arc;

use chrono::Datelike;
use rand::rngs::OsRng;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::sign::CertifiedKey;

use crate::authority::CertificateAuthority;
use crate::error::CertError;

const RSA_KEY_BITS: usize = 2048;
const LEAF_VALID_DAYS: i64 = 365;

/// A minted leaf certificate, pre-built into the `rustls::sign::CertifiedKey`
/// shape a per-SNI `ResolvesServerCert` hands straight to the handshake.
pub struct CertifiedLeaf {
    pub certified_key: Arc<CertifiedKey>,
}

/// Mints a fresh leaf certificate for `host`, signed by `ca`, with SANs
/// `{host, *.host}` per the certificate store's data model.
pub fn mint_leaf(ca: &CertificateAuthority, host: &str) -> Result<CertifiedLeaf, CertError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| CertError::KeyGen(e.to_string()))?;
    let key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CertError::KeyGen(e.to_string()))?;
    let key_pair =
        KeyPair::from_pem(&key_pem).map_err(|e| CertError::KeyGen(e.to_string()))?;
    let key_der_bytes = key_pair.serialize_der();

    let mut params = CertificateParams::new(vec![host.to_string(), format!("*.{host}")]);
    params.alg = &rcgen::PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);
    params.subject_alt_names = vec![
        SanType::DnsName(host.to_string()),
        SanType::DnsName(format!("*.{host}")),
    ];

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, host);
    params.distinguished_name = dn;

    let now = chrono::Utc::now();
    params.not_before = rcgen::date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
    let expiry = now + chrono::Duration::days(LEAF_VALID_DAYS);
    params.not_after =
        rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

    let leaf_cert = rcgen::Certificate::from_params(params)?;
    let cert_der = leaf_cert.serialize_der_with_signer(ca.rcgen_cert())?;

    let cert_chain: Vec<CertificateDer<'static>> = vec![CertificateDer::from(cert_der)];
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der_bytes));
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key_der)
        .map_err(|e| CertError::KeyGen(e.to_string()))?;

    Ok(CertifiedLeaf {
        certified_key: Arc::new(CertifiedKey::new(cert_chain, signing_key)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::CertificateAuthority;

    #[test]
    fn mints_leaf_for_host() {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::load_or_generate(dir.path()).unwrap();
        let leaf = mint_leaf(&ca, "api.openai.com").unwrap();
        assert_eq!(leaf.certified_key.cert.len(), 1);
    }
}
