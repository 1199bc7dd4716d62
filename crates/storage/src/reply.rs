//! Backing-store replies

use strata_model_core::{StoreError, StoreResult};

/// One reply from the backing store
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Null bulk string or null array
    Nil,
    /// Integer reply
    Int(i64),
    /// Bulk string reply
    Bytes(Vec<u8>),
    /// Array reply
    Array(Vec<Reply>),
    /// Simple string reply (`OK`, `QUEUED`, ...)
    Status(String),
}

impl Reply {
    /// Whether this is `Nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Integer reply
    pub fn into_int(self) -> StoreResult<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Integer reply read as a boolean (`SISMEMBER`)
    pub fn into_bool(self) -> StoreResult<bool> {
        self.into_int().map(|n| n != 0)
    }

    /// Bulk string reply
    pub fn into_bytes(self) -> StoreResult<Vec<u8>> {
        match self {
            Reply::Bytes(bytes) => Ok(bytes),
            Reply::Status(text) => Ok(text.into_bytes()),
            other => Err(unexpected("bulk string", &other)),
        }
    }

    /// Bulk string reply that may be `Nil`
    pub fn into_optional_bytes(self) -> StoreResult<Option<Vec<u8>>> {
        match self {
            Reply::Nil => Ok(None),
            other => other.into_bytes().map(Some),
        }
    }

    /// Array reply
    pub fn into_array(self) -> StoreResult<Vec<Reply>> {
        match self {
            Reply::Array(items) => Ok(items),
            Reply::Nil => Ok(Vec::new()),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Array of bulk strings (`SMEMBERS`, `ZRANGE`)
    pub fn into_bytes_array(self) -> StoreResult<Vec<Vec<u8>>> {
        self.into_array()?
            .into_iter()
            .map(Reply::into_bytes)
            .collect()
    }

    /// Array of optional bulk strings (`HMGET`)
    pub fn into_optional_bytes_array(self) -> StoreResult<Vec<Option<Vec<u8>>>> {
        self.into_array()?
            .into_iter()
            .map(Reply::into_optional_bytes)
            .collect()
    }

    /// Flat field/value array as pairs (`HGETALL`)
    pub fn into_pairs(self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let items = self.into_bytes_array()?;
        if items.len() % 2 != 0 {
            return Err(StoreError::Protocol(format!(
                "expected an even number of elements, got {}",
                items.len()
            )));
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    /// Score reply that may be `Nil` (`ZSCORE`)
    pub fn into_score(self) -> StoreResult<Option<f64>> {
        let Some(raw) = self.into_optional_bytes()? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        parse_score(&text)
            .map(Some)
            .ok_or_else(|| StoreError::Protocol(format!("invalid score {text:?}")))
    }
}

/// Parse a score the way Redis prints it
pub fn parse_score(text: &str) -> Option<f64> {
    match text {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn unexpected(expected: &str, got: &Reply) -> StoreError {
    StoreError::Protocol(format!("expected {expected} reply, got {got:?}"))
}
