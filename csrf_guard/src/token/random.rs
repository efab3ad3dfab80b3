use ring::rand::{SecureRandom, SystemRandom};

use crate::errors::CsrfError;

/// Token characters. Uppercase alphanumerics keep tokens safe to embed in
/// headers, query parameters and form fields without escaping.
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest multiple of the charset size that fits in a byte; bytes at or
/// above it are rejected to keep the character distribution uniform.
const REJECTION_THRESHOLD: u8 = (u8::MAX / TOKEN_CHARSET.len() as u8) * TOKEN_CHARSET.len() as u8;

const DEFAULT_SOURCE: &str = "SystemRandom";
const DEFAULT_PROVIDER: &str = "ring";

/// Cryptographically secure token generator.
///
/// The configured algorithm/provider names are optional hardening knobs: an
/// unknown name is logged and the generator degrades to the platform default
/// source instead of failing startup.
pub(crate) struct TokenGenerator {
    rng: SystemRandom,
    length: usize,
}

impl TokenGenerator {
    pub(crate) fn new(length: usize, algorithm: Option<&str>, provider: Option<&str>) -> Self {
        if let Some(provider) = provider
            && !provider.eq_ignore_ascii_case(DEFAULT_PROVIDER)
        {
            tracing::warn!(
                "The configured secure random provider '{}' was not found, trying the default provider.",
                provider
            );
        }
        if let Some(algorithm) = algorithm
            && !algorithm.eq_ignore_ascii_case(DEFAULT_SOURCE)
        {
            tracing::warn!(
                "The configured secure random algorithm '{}' was not found, reverting to the system default.",
                algorithm
            );
        }
        tracing::info!(
            "Using secure random provider '{}' and '{}' algorithm.",
            DEFAULT_PROVIDER,
            DEFAULT_SOURCE
        );

        Self {
            rng: SystemRandom::new(),
            length,
        }
    }

    /// Generate one token of the configured length.
    pub(crate) fn generate(&self) -> Result<String, CsrfError> {
        let mut token = String::with_capacity(self.length);
        let mut buf = [0u8; 64];

        while token.len() < self.length {
            self.rng
                .fill(&mut buf)
                .map_err(|_| CsrfError::Crypto("Failed to generate random bytes".to_string()))?;

            for byte in buf {
                if token.len() == self.length {
                    break;
                }
                if byte < REJECTION_THRESHOLD {
                    token.push(TOKEN_CHARSET[(byte % TOKEN_CHARSET.len() as u8) as usize] as char);
                }
            }
        }

        Ok(token)
    }
}
