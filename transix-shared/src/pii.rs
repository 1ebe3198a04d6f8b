use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for personal data (passenger names, contact details) that hides the
/// value from Debug/Display so it cannot leak through log macros.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Masked(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // API responses need the real value; the masking is only for Debug
        // output reaching logs via tracing::info!("{:?}", ...).
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_masked() {
        let name = Masked::new("Ada Lovelace".to_string());
        assert_eq!(format!("{:?}", name), "********");
        assert_eq!(format!("{}", name), "********");
    }

    #[test]
    fn test_serialize_passes_through() {
        let name = Masked::new("Ada Lovelace".to_string());
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Ada Lovelace\"");
    }
}
