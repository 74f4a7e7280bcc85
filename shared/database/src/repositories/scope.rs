//! Scope rendering
//!
//! Turns an access [`Scope`] into a SQL predicate on a `QueryBuilder`. Every
//! value is bound, never interpolated.

use cardhub_models::Scope;
use sqlx::{Postgres, QueryBuilder};

/// Columns a scope predicate is written against, qualified with the query's alias.
#[derive(Debug, Clone, Copy)]
pub struct ScopeColumns {
    pub id: &'static str,
    pub organization: &'static str,
    pub created_by: Option<&'static str>,
}

pub const USER_SCOPE: ScopeColumns = ScopeColumns {
    id: "u.id",
    organization: "u.organization_id",
    created_by: Some("u.created_by"),
};

pub const AGENT_SCOPE: ScopeColumns = ScopeColumns {
    id: "a.user_id",
    organization: "NULL",
    created_by: None,
};

pub const ORGANIZATION_SCOPE: ScopeColumns = ScopeColumns {
    id: "o.id",
    organization: "o.id",
    created_by: Some("o.created_by"),
};

pub const TEMPLATE_SCOPE: ScopeColumns = ScopeColumns {
    id: "t.id",
    organization: "t.organization_id",
    created_by: Some("t.created_by"),
};

pub const ID_CARD_SCOPE: ScopeColumns = ScopeColumns {
    id: "c.id",
    organization: "c.organization_id",
    created_by: Some("c.created_by"),
};

/// Append the predicate for `scope`, wrapped in parentheses.
pub fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, columns: &ScopeColumns) {
    qb.push("(");
    match *scope {
        Scope::All => {
            qb.push("TRUE");
        }
        Scope::AgentOrganizations(agent_id) => {
            qb.push(columns.organization)
                .push(" IN (SELECT id FROM organizations WHERE agent_id = ")
                .push_bind(agent_id)
                .push(")");
        }
        Scope::Organization(organization_id) => {
            qb.push(columns.organization)
                .push(" = ")
                .push_bind(organization_id);
        }
        Scope::CreatedBy {
            organization_id,
            user_id,
        } => match columns.created_by {
            Some(created_by) => {
                qb.push(columns.organization)
                    .push(" = ")
                    .push_bind(organization_id)
                    .push(" AND ")
                    .push(created_by)
                    .push(" = ")
                    .push_bind(user_id);
            }
            None => {
                qb.push("FALSE");
            }
        },
        Scope::Record(id) => {
            qb.push(columns.id).push(" = ").push_bind(id);
        }
    }
    qb.push(")");
}

/// `%term%` pattern for case-insensitive `ILIKE` searches, with wildcards escaped.
pub fn search_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn render(scope: Scope, columns: &ScopeColumns) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM t WHERE ");
        push_scope(&mut qb, &scope, columns);
        qb.push(" AND x = ").push_bind(1_i32);
        qb.sql().to_string()
    }

    #[test]
    fn test_all_scope() {
        assert_eq!(
            render(Scope::All, &ID_CARD_SCOPE),
            "SELECT 1 FROM t WHERE (TRUE) AND x = $1"
        );
    }

    #[test]
    fn test_agent_scope_uses_subquery() {
        assert_eq!(
            render(Scope::AgentOrganizations(Uuid::new_v4()), &TEMPLATE_SCOPE),
            "SELECT 1 FROM t WHERE (t.organization_id IN (SELECT id FROM organizations WHERE agent_id = $1)) AND x = $2"
        );
    }

    #[test]
    fn test_organization_scope_on_organizations_table() {
        assert_eq!(
            render(Scope::Organization(Uuid::new_v4()), &ORGANIZATION_SCOPE),
            "SELECT 1 FROM t WHERE (o.id = $1) AND x = $2"
        );
    }

    #[test]
    fn test_created_by_scope_binds_both_values() {
        let scope = Scope::CreatedBy {
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        assert_eq!(
            render(scope, &ID_CARD_SCOPE),
            "SELECT 1 FROM t WHERE (c.organization_id = $1 AND c.created_by = $2) AND x = $3"
        );
        assert_eq!(
            render(scope, &AGENT_SCOPE),
            "SELECT 1 FROM t WHERE (FALSE) AND x = $1"
        );
    }

    #[test]
    fn test_record_scope() {
        assert_eq!(
            render(Scope::Record(Uuid::new_v4()), &USER_SCOPE),
            "SELECT 1 FROM t WHERE (u.id = $1) AND x = $2"
        );
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern("  "), None);
        assert_eq!(search_pattern("ravi").as_deref(), Some("%ravi%"));
        assert_eq!(search_pattern("50%_off").as_deref(), Some("%50\\%\\_off%"));
    }

    proptest::proptest! {
        #[test]
        fn prop_search_pattern_has_no_bare_wildcards(term in ".{0,40}") {
            if let Some(pattern) = search_pattern(&term) {
                let inner = &pattern[1..pattern.len() - 1];
                let mut chars = inner.chars();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        let escaped = chars.next();
                        proptest::prop_assert!(matches!(escaped, Some('\\' | '%' | '_')));
                    } else {
                        proptest::prop_assert!(c != '%' && c != '_');
                    }
                }
            }
        }

        #[test]
        fn prop_scope_binds_match_placeholders(org in proptest::prelude::any::<u128>(), user in proptest::prelude::any::<u128>()) {
            let scopes = [
                Scope::All,
                Scope::AgentOrganizations(Uuid::from_u128(user)),
                Scope::Organization(Uuid::from_u128(org)),
                Scope::CreatedBy { organization_id: Uuid::from_u128(org), user_id: Uuid::from_u128(user) },
                Scope::Record(Uuid::from_u128(user)),
            ];
            for scope in scopes {
                let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 WHERE ");
                push_scope(&mut qb, &scope, &ID_CARD_SCOPE);
                let placeholders = qb.sql().matches('$').count();
                let expected = match scope {
                    Scope::All => 0,
                    Scope::CreatedBy { .. } => 2,
                    _ => 1,
                };
                proptest::prop_assert_eq!(placeholders, expected);
            }
        }
    }
}
