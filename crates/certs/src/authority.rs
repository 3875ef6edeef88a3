use std::path::{Path, PathBuf};

use chrono::Datelike;
use rand::rngs::OsRng;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType, KeyPair};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::CertError;

const RSA_KEY_BITS: usize = 2048;
const CA_VALID_DAYS: i64 = 365 * 10;

/// One root CA, persisted as PEM key + cert. `ring` (which `rcgen` signs
/// through) cannot generate RSA keys itself, so the keypair is generated
/// with the `rsa` crate and handed to `rcgen` as an existing PKCS#8 key —
/// the standard workaround for minting RSA certs with rcgen.
pub struct CertificateAuthority {
    cert: Certificate,
    cert_pem: String,
}

impl CertificateAuthority {
    /// Loads the CA from `dir` if both PEM files exist, otherwise generates
    /// a fresh one and persists it.
    pub fn load_or_generate(dir: impl AsRef<Path>) -> Result<Self, CertError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let key_path = dir.join("ca.key.pem");
        let cert_path = dir.join("ca.cert.pem");

        if key_path.exists() && cert_path.exists() {
            Self::load(&key_path, &cert_path)
        } else {
            let authority = Self::generate()?;
            std::fs::write(&key_path, authority.cert.serialize_private_key_pem())?;
            std::fs::write(&cert_path, &authority.cert_pem)?;
            Ok(authority)
        }
    }

    fn load(key_path: &Path, cert_path: &Path) -> Result<Self, CertError> {
        let key_pem = std::fs::read_to_string(key_path)?;
        let cert_pem = std::fs::read_to_string(cert_path)?;
        let key_pair = KeyPair::from_pem(&key_pem)
            .map_err(|e| CertError::InvalidCa(format!("stored CA key is unreadable: {e}")))?;
        let params = CertificateParams::from_ca_cert_pem(&cert_pem, key_pair)
            .map_err(|e| CertError::InvalidCa(format!("stored CA cert is unreadable: {e}")))?;
        let cert = Certificate::from_params(params)?;
        Ok(Self { cert, cert_pem })
    }

    fn generate() -> Result<Self, CertError> {
        let key_pair = generate_rsa_keypair()?;

        let mut params = CertificateParams::new(Vec::new());
        params.alg = &rcgen::PKCS_RSA_SHA256;
        params.key_pair = Some(key_pair);
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
            rcgen::KeyUsagePurpose::DigitalSignature,
        ];
        let now = chrono::Utc::now();
        params.not_before = rcgen::date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
        let expiry = now + chrono::Duration::days(CA_VALID_DAYS);
        params.not_after =
            rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "Complyze AI Proxy CA");
        params.distinguished_name = dn;

        let cert = Certificate::from_params(params)?;
        let cert_pem = cert.serialize_pem()?;
        Ok(Self { cert, cert_pem })
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub(crate) fn rcgen_cert(&self) -> &Certificate {
        &self.cert
    }
}

fn generate_rsa_keypair() -> Result<KeyPair, CertError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| CertError::KeyGen(e.to_string()))?;
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CertError::KeyGen(e.to_string()))?;
    KeyPair::from_pem(&pem).map_err(|e| CertError::KeyGen(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_reloads_consistently() {
        let dir = tempfile::tempdir().unwrap();
        let first = CertificateAuthority::load_or_generate(dir.path()).unwrap();
        let second = CertificateAuthority::load_or_generate(dir.path()).unwrap();
        assert_eq!(first.cert_pem(), second.cert_pem());
    }

    #[test]
    fn cert_pem_contains_common_name_marker() {
        let dir = tempfile::tempdir().unwrap();
        let authority = CertificateAuthority::load_or_generate(dir.path()).unwrap();
        assert!(authority.cert_pem().starts_with("-----BEGIN CERTIFICATE-----"));
    }
}
