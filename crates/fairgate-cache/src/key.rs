//! Tenant-prefixed cache keys.

use fairgate_core::TenantId;

/// Longest combined `<tenant>:<suffix>` key stored verbatim; anything
/// longer has its suffix digested.
const MAX_PLAIN_KEY_LEN: usize = 200;

/// Builds the tenant-scoped portion of a cache key: `<tenant>:<suffix>`.
/// When the combined form exceeds [`MAX_PLAIN_KEY_LEN`], the suffix is
/// replaced by a fixed digest so the tenant prefix always survives as the
/// isolation boundary.
pub(crate) fn tenant_key(tenant_id: &TenantId, suffix: &str) -> String {
    let plain = format!("{tenant_id}:{suffix}");
    if plain.len() <= MAX_PLAIN_KEY_LEN {
        return plain;
    }
    let digest = blake3::hash(suffix.as_bytes());
    format!("{tenant_id}:{}", digest.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_keep_their_suffix() {
        let key = tenant_key(&TenantId::from("acme"), "bm25:what changed");
        assert_eq!(key, "acme:bm25:what changed");
    }

    #[test]
    fn long_keys_are_digested_but_keep_the_tenant_prefix() {
        let tenant = TenantId::from("acme");
        let suffix = "q".repeat(500);
        let key = tenant_key(&tenant, &suffix);

        assert!(key.starts_with("acme:"));
        assert!(key.len() < 200);
        // Deterministic: the same suffix digests to the same key.
        assert_eq!(key, tenant_key(&tenant, &suffix));
    }

    #[test]
    fn different_tenants_never_share_a_key() {
        let suffix = "q".repeat(500);
        let a = tenant_key(&TenantId::from("tenant-a"), &suffix);
        let b = tenant_key(&TenantId::from("tenant-b"), &suffix);
        assert_ne!(a, b);
        assert!(a.starts_with("tenant-a:"));
        assert!(b.starts_with("tenant-b:"));
    }
}
