//! Cross-tenant leakage checks.

use fairgate_core::{ScoredDoc, TenantId};
use thiserror::Error;

/// A document tagged with one tenant reached a request served for another.
/// This is a hard security violation: never masked, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document {doc_id} belongs to tenant {document_tenant}, not {requesting_tenant}")]
pub struct IsolationViolation {
    pub doc_id: String,
    pub document_tenant: TenantId,
    pub requesting_tenant: TenantId,
}

/// Asserts that every retrieved document belongs to the requesting tenant.
pub fn check_tenant_isolation(
    docs: &[ScoredDoc],
    requesting_tenant: &TenantId,
) -> Result<(), IsolationViolation> {
    for doc in docs {
        if &doc.tenant_id != requesting_tenant {
            return Err(IsolationViolation {
                doc_id: doc.doc_id.clone(),
                document_tenant: doc.tenant_id.clone(),
                requesting_tenant: requesting_tenant.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, tenant: &str) -> ScoredDoc {
        ScoredDoc {
            doc_id: id.to_string(),
            content: "c".to_string(),
            score: 1.0,
            tenant_id: TenantId::from(tenant),
        }
    }

    #[test]
    fn same_tenant_documents_pass() {
        let docs = vec![doc("d1", "a"), doc("d2", "a")];
        assert!(check_tenant_isolation(&docs, &TenantId::from("a")).is_ok());
    }

    #[test]
    fn a_single_foreign_document_fails_the_whole_batch() {
        let docs = vec![doc("d1", "a"), doc("d2", "b"), doc("d3", "a")];
        let violation = check_tenant_isolation(&docs, &TenantId::from("a")).unwrap_err();
        assert_eq!(violation.doc_id, "d2");
        assert_eq!(violation.document_tenant, TenantId::from("b"));
    }
}
