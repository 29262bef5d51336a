//! The small query dialect the mock understands.
//!
//! Two statement shapes are accepted:
//! - `RETURN <json literal>` or `RETURN @param`
//! - `FOR <var> IN <relation> RETURN <var>`

use dbmsdb_core::errno;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Return(Value),
    ReturnBind(String),
    ForIn { variable: String, relation: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("syntax error, unexpected {token} near '{near}'")]
    Syntax { token: String, near: String },
    #[error("no value specified for declared bind parameter '{0}'")]
    MissingBindParameter(String),
}

impl QueryError {
    pub fn errno(&self) -> i64 {
        match self {
            QueryError::Empty => errno::QUERY_EMPTY,
            QueryError::Syntax { .. } => errno::QUERY_PARSE,
            QueryError::MissingBindParameter(_) => errno::QUERY_BIND_PARAMETER_MISSING,
        }
    }
}

fn syntax(token: &str, near: &str) -> QueryError {
    QueryError::Syntax {
        token: token.to_string(),
        near: near.to_string(),
    }
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Query {
    pub fn parse(text: &str) -> Result<Query, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::Empty);
        }

        let (keyword, rest) = text
            .split_once(char::is_whitespace)
            .unwrap_or((text, ""));
        let rest = rest.trim();

        match keyword.to_ascii_uppercase().as_str() {
            "RETURN" => {
                if rest.is_empty() {
                    return Err(syntax("end of query", text));
                }
                if let Some(name) = rest.strip_prefix('@') {
                    return if is_identifier(name) {
                        Ok(Query::ReturnBind(name.to_string()))
                    } else {
                        Err(syntax("bind parameter", rest))
                    };
                }
                serde_json::from_str(rest).map(Query::Return).map_err(|_| {
                    let token = rest.split_whitespace().next().unwrap_or(rest);
                    syntax(token, rest)
                })
            }
            "FOR" => {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                match tokens.as_slice() {
                    [variable, kw_in, relation, kw_return, returned]
                        if kw_in.eq_ignore_ascii_case("IN")
                            && kw_return.eq_ignore_ascii_case("RETURN")
                            && returned == variable
                            && is_identifier(variable)
                            && is_identifier(relation) =>
                    {
                        Ok(Query::ForIn {
                            variable: variable.to_string(),
                            relation: relation.to_string(),
                        })
                    }
                    _ => Err(syntax("FOR loop", text)),
                }
            }
            _ => Err(syntax(keyword, text)),
        }
    }

    /// Relations the query reads from
    pub fn relations(&self) -> Vec<&str> {
        match self {
            Query::ForIn { relation, .. } => vec![relation.as_str()],
            _ => Vec::new(),
        }
    }

    /// Bind parameters the query declares
    pub fn bind_parameters(&self) -> Vec<&str> {
        match self {
            Query::ReturnBind(name) => vec![name.as_str()],
            _ => Vec::new(),
        }
    }

    /// Resolve a `RETURN` statement against the bind variables.
    /// `None` for statements that read a relation.
    pub fn constant(&self, bind_vars: &Map<String, Value>) -> Option<Result<Value, QueryError>> {
        match self {
            Query::Return(value) => Some(Ok(value.clone())),
            Query::ReturnBind(name) => Some(
                bind_vars
                    .get(name)
                    .cloned()
                    .ok_or_else(|| QueryError::MissingBindParameter(name.clone())),
            ),
            Query::ForIn { .. } => None,
        }
    }
}
