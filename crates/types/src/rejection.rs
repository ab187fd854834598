use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Reason attached to a rejected settlement record
///
/// Wraps an [`anyhow::Error`] behind an `Arc` so a rejection can be carried
/// forward through every later stage and handed to hooks without copying the
/// underlying error.
#[derive(Clone)]
pub struct Rejection(Arc<anyhow::Error>);

impl Rejection {
    /// Wrap a concrete error type
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::new(error)))
    }

    /// Build a rejection from a plain message
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Borrow the underlying error
    pub fn as_error(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to view the reason as a specific error type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// True when both handles point at the same underlying error
    pub fn ptr_eq(&self, other: &Rejection) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<anyhow::Error> for Rejection {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rejection")
            .field(&self.0.to_string())
            .finish()
    }
}

// Rejections cross serialization boundaries as their display string.
impl Serialize for Rejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rejection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let message = String::deserialize(deserializer)?;
        Ok(Rejection::msg(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("division by zero at {0}")]
    struct DivideByZero(usize);

    #[test]
    fn test_rejection_from_message() {
        let rejection = Rejection::msg("negative");
        assert_eq!(rejection.to_string(), "negative");
    }

    #[test]
    fn test_rejection_downcast() {
        let rejection = Rejection::new(DivideByZero(3));
        assert_eq!(rejection.to_string(), "division by zero at 3");

        let inner = rejection.downcast_ref::<DivideByZero>().unwrap();
        assert_eq!(inner.0, 3);
    }

    #[test]
    fn test_rejection_clone_shares_error() {
        let rejection = Rejection::from(anyhow::anyhow!("boom"));
        let carried = rejection.clone();
        assert!(rejection.ptr_eq(&carried));
        assert!(!rejection.ptr_eq(&Rejection::msg("boom")));
    }

    #[test]
    fn test_rejection_serializes_as_string() {
        let rejection = Rejection::msg("bad input");
        let json = serde_json::to_string(&rejection).unwrap();
        assert_eq!(json, "\"bad input\"");

        let back: Rejection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "bad input");
    }
}
