use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

const REFRESH_TOKEN_BYTES: usize = 32;

/// Opaque refresh token: 256 bits from the OS CSPRNG, base64url without
/// padding. Carries no claims.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    use super::{REFRESH_TOKEN_BYTES, generate_refresh_token};

    #[test]
    fn encodes_full_entropy_as_base64url() {
        let token = generate_refresh_token();

        assert_eq!(token.len(), 43);
        let decoded = URL_SAFE_NO_PAD
            .decode(&token)
            .expect("token should be base64url");
        assert_eq!(decoded.len(), REFRESH_TOKEN_BYTES);
    }

    #[test]
    fn does_not_repeat() {
        let tokens: HashSet<String> = (0..256).map(|_| generate_refresh_token()).collect();

        assert_eq!(tokens.len(), 256);
    }
}
