use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Parse,
    Io,
}

impl ErrorKind {
    pub(crate) fn from_code(code: &'static str) -> Self {
        match code {
            // Validation
            "E1001" | "E1002" | "E1003" | "E1004" | "E1005" => Self::Validation,

            // NotFound
            "E2001" | "E2002" | "E2003" | "E2004" | "E2005" | "E2006" => Self::NotFound,

            // Storage
            "E3001" | "E3002" | "E3003" | "E3004" | "E3005" => Self::Storage,

            // Parse
            "E4001" | "E4002" | "E4003" | "E4004" => Self::Parse,

            // Io
            "E5001" | "E5002" => Self::Io,

            _ => Self::Validation,
        }
    }
}

pub type Result<T, E = SquadError> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct SquadError {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,

    pub key: Option<String>,
    pub path: Option<String>,
    pub row: Option<usize>,
    pub id: Option<String>,
}

impl SquadError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: ErrorKind::from_code(code),
            message: message.into(),

            key: None,
            path: None,
            row: None,
            id: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub(crate) fn not_found(code: &'static str, what: &str, id: &str) -> Self {
        Self::new(code, format!("{what} not found: {id}")).with_id(id)
    }
}
