//! Query selection.
//!
//! Picks the bulk template when no parent is given and the narrow template
//! otherwise, binding the container name first and the parent name second.

use crate::error::CacheError;
use crate::model::Container;

/// Which catalog query a load runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryTemplate {
    /// Every parent in the container; binds `[container]`
    AllInContainer,
    /// One parent; binds `[container, parent]`
    SingleParent,
}

impl QueryTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryTemplate::AllInContainer => "all_in_container",
            QueryTemplate::SingleParent => "single_parent",
        }
    }
}

/// A template together with its positional parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub template: QueryTemplate,
    pub params: Vec<String>,
}

impl BoundQuery {
    pub fn new(template: QueryTemplate, params: Vec<String>) -> Self {
        Self { template, params }
    }
}

/// Choose and bind the query for a scope.
pub fn select_query(
    container: Option<&dyn Container>,
    parent: Option<&str>,
) -> Result<BoundQuery, CacheError> {
    let container_name = match container.map(|c| c.name()) {
        Some(name) if !name.is_empty() => name,
        Some(_) => return Err(CacheError::InvalidScope("container has no name".to_string())),
        None => return Err(CacheError::InvalidScope("no container given".to_string())),
    };

    match parent {
        None => Ok(BoundQuery::new(
            QueryTemplate::AllInContainer,
            vec![container_name.to_string()],
        )),
        Some("") => Err(CacheError::InvalidScope(format!(
            "parent in '{}' has no name",
            container_name
        ))),
        Some(parent) => Ok(BoundQuery::new(
            QueryTemplate::SingleParent,
            vec![container_name.to_string(), parent.to_string()],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;

    #[test]
    fn test_bulk_query_binds_container_only() {
        let schema = Schema::new("SALES");
        let query = select_query(Some(&schema), None).unwrap();
        assert_eq!(query.template, QueryTemplate::AllInContainer);
        assert_eq!(query.params, vec!["SALES"]);
    }

    #[test]
    fn test_narrow_query_binds_container_then_parent() {
        let schema = Schema::new("SALES");
        let query = select_query(Some(&schema), Some("ORDERS")).unwrap();
        assert_eq!(query.template, QueryTemplate::SingleParent);
        assert_eq!(query.params, vec!["SALES", "ORDERS"]);
    }

    #[test]
    fn test_invalid_scopes() {
        assert!(matches!(
            select_query(None, None),
            Err(CacheError::InvalidScope(_))
        ));
        let unnamed = Schema::new("");
        assert!(matches!(
            select_query(Some(&unnamed), Some("T")),
            Err(CacheError::InvalidScope(_))
        ));
        let schema = Schema::new("S");
        assert!(matches!(
            select_query(Some(&schema), Some("")),
            Err(CacheError::InvalidScope(_))
        ));
    }
}
