use std::fmt;

/// A wrapper that keeps identity secrets out of formatted output.
///
/// Client tokens, wrapping tokens and salt keys travel through the crate
/// inside `Secret<T>`. The value is only reachable through
/// [`expose_secret`](Self::expose_secret), which the entry builder calls
/// exclusively to feed the salt.
///
/// # Examples
///
/// ```
/// use audit_core::Secret;
///
/// let token = Secret::new("s.8Fq2rXkPz".to_string());
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "s.8Fq2rXkPz");
/// ```
// Do NOT derive Clone, Copy, Default or Serialize: each one is a way for the
// raw value to leave the wrapper without going through expose_secret().
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// The returned reference must only be handed to a salt, never written
    /// to an entry.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl Secret<String> {
    /// Returns `true` if the wrapped string is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Secret<Vec<u8>> {
    /// Returns the length of the wrapped key material.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there is no key material.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug() {
        let token = Secret::new("s.hunter2".to_string());
        let debug_output = format!("{:?}", token);

        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("String"));
    }

    #[test]
    fn secret_redacts_display() {
        let key = Secret::new(vec![0xde_u8, 0xad, 0xbe, 0xef]);
        assert_eq!(key.to_string(), "[REDACTED]");
    }

    #[test]
    fn secret_exposes_when_explicit() {
        let token = Secret::new("root-token".to_string());
        assert_eq!(token.expose_secret(), "root-token");
        assert!(!token.is_empty());
    }

    #[test]
    fn key_material_length() {
        let key = Secret::new(vec![7u8; 32]);
        assert_eq!(key.len(), 32);
        assert!(Secret::new(Vec::<u8>::new()).is_empty());
    }
}
