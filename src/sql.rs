//! COPY statement construction
//!
//! Every statement starts with [`MARKER`]. Besides making rin's statements
//! easy to find in `STL_QUERY`, the leading comment keeps PostgreSQL drivers
//! from treating the statement as a PostgreSQL `COPY` and waiting for a
//! copy-in response that Redshift never sends.

use std::fmt;

pub const MARKER: &str = "/* Rin */";

/// Quote an identifier: wrap in double quotes and double embedded ones.
/// Anything from the first NUL on is dropped.
pub fn quote_identifier(name: &str) -> String {
    let name = name.split('\0').next().unwrap_or_default();
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal: wrap in single quotes and double embedded ones.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Credentials Redshift uses to read the source object.
#[derive(Clone, PartialEq, Eq)]
pub enum CopyCredentials {
    IamRole(String),
    AccessKey {
        access_key_id: String,
        secret_access_key: String,
    },
}

impl CopyCredentials {
    /// The role wins when one is configured.
    pub fn new(
        iam_role: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
    ) -> Self {
        match iam_role.filter(|r| !r.is_empty()) {
            Some(role) => CopyCredentials::IamRole(role.to_string()),
            None => CopyCredentials::AccessKey {
                access_key_id: access_key_id.unwrap_or_default().to_string(),
                secret_access_key: secret_access_key.unwrap_or_default().to_string(),
            },
        }
    }

    /// Value of the `CREDENTIALS` clause
    pub fn clause(&self) -> String {
        match self {
            CopyCredentials::IamRole(role) => format!("aws_iam_role={role}"),
            CopyCredentials::AccessKey {
                access_key_id,
                secret_access_key,
            } => format!("aws_access_key_id={access_key_id};aws_secret_access_key={secret_access_key}"),
        }
    }
}

impl fmt::Debug for CopyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyCredentials::IamRole(role) => f.debug_tuple("IamRole").field(role).finish(),
            CopyCredentials::AccessKey { access_key_id, .. } => f
                .debug_struct("AccessKey")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"****")
                .finish(),
        }
    }
}

/// Destination table, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName<'a> {
    pub schema: Option<&'a str>,
    pub table: &'a str,
}

impl fmt::Display for TableName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.schema.filter(|s| !s.is_empty()) {
            Some(schema) => write!(
                f,
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(self.table)
            ),
            None => write!(f, "{}", quote_identifier(self.table)),
        }
    }
}

/// Build `/* Rin */ COPY <table> FROM '<source>' CREDENTIALS '...' REGION '...' <options>`.
pub fn copy_statement(
    table: &TableName<'_>,
    source_uri: &str,
    credentials: &CopyCredentials,
    region: &str,
    options: &str,
) -> String {
    let mut sql = format!(
        "{MARKER} COPY {table} FROM {} CREDENTIALS {} REGION {}",
        quote_literal(source_uri),
        quote_literal(&credentials.clause()),
        quote_literal(region),
    );
    if !options.is_empty() {
        sql.push(' ');
        sql.push_str(options);
    }
    sql
}
