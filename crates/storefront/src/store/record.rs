//! Encoding of domain entities as stored records.
//!
//! Records are flat JSON. Unknown fields are ignored when decoding so newer
//! writers do not break older readers; known fields must parse and pass the
//! entity's shape check, otherwise the record counts as malformed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use techland_core::{CartShapeError, CartState, UserSession};

/// Why a stored record could not be used.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The raw value is not valid JSON for the entity.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The cart parsed but violates a cart invariant.
    #[error("invalid cart record: {0}")]
    InvalidCart(#[from] CartShapeError),

    /// The session parsed but has no usable id.
    #[error("invalid session record: blank id")]
    BlankSessionId,
}

/// A domain entity that can be stored under a single key.
pub trait Record: Serialize + DeserializeOwned {
    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` describing the first violated invariant.
    fn check(&self) -> Result<(), RecordError>;

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Malformed` if serialization fails.
    fn encode(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored value and check its shape.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` if the value does not parse or fails the check.
    fn decode(raw: &str) -> Result<Self, RecordError> {
        let value: Self = serde_json::from_str(raw)?;
        value.check()?;
        Ok(value)
    }
}

impl Record for CartState {
    fn check(&self) -> Result<(), RecordError> {
        Ok(self.validate()?)
    }
}

impl Record for UserSession {
    fn check(&self) -> Result<(), RecordError> {
        if self.id.is_blank() {
            return Err(RecordError::BlankSessionId);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use techland_core::{Price, ProductId, Role};

    use super::*;

    #[test]
    fn test_cart_roundtrip() {
        let mut cart = CartState::new();
        cart.add_line(
            ProductId::new("p1"),
            "Mouse".to_string(),
            Price::from_units(20),
            "img".to_string(),
        );
        cart.add_line(
            ProductId::new("p1"),
            "Mouse".to_string(),
            Price::from_units(20),
            "img".to_string(),
        );

        let raw = cart.encode().unwrap();
        assert_eq!(CartState::decode(&raw).unwrap(), cart);
    }

    #[test]
    fn test_cart_ignores_unknown_fields() {
        let raw = r#"[{"productId":"p1","name":"Mouse","unitPrice":20,"imageRef":"img","quantity":3,"color":"red"}]"#;
        let cart = CartState::decode(raw).unwrap();
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_cart_rejects_garbage() {
        assert!(matches!(
            CartState::decode("{not json"),
            Err(RecordError::Malformed(_))
        ));
        assert!(matches!(
            CartState::decode(r#"{"productId":"p1"}"#),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_cart_rejects_bad_shape() {
        let zero = r#"[{"productId":"p1","name":"Mouse","unitPrice":20,"imageRef":"img","quantity":0}]"#;
        assert!(matches!(
            CartState::decode(zero),
            Err(RecordError::InvalidCart(CartShapeError::ZeroQuantity(_)))
        ));

        let negative_qty = r#"[{"productId":"p1","name":"Mouse","unitPrice":20,"imageRef":"img","quantity":-1}]"#;
        assert!(matches!(
            CartState::decode(negative_qty),
            Err(RecordError::Malformed(_))
        ));

        let negative_price = r#"[{"productId":"p1","name":"Mouse","unitPrice":-2,"imageRef":"img","quantity":1}]"#;
        assert!(matches!(
            CartState::decode(negative_price),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_session_roundtrip_and_check() {
        let session = UserSession::new("u1", "ana", "Ana", "ana@x.co", Role::Admin, Utc::now());
        let raw = session.encode().unwrap();
        assert_eq!(UserSession::decode(&raw).unwrap(), session);

        let blank = UserSession::new(" ", "ana", "Ana", "ana@x.co", Role::Admin, Utc::now());
        let raw = serde_json::to_string(&blank).unwrap();
        assert!(matches!(
            UserSession::decode(&raw),
            Err(RecordError::BlankSessionId)
        ));
    }
}
