//! Cart lines and the cart state they make up.
//!
//! These are pure values: quantity arithmetic and derived totals live here so
//! they can be checked without any storage attached. Persistence and change
//! notification belong to the storefront cart manager.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Largest quantity a cart line can hold.
pub const MAX_QUANTITY: u32 = u32::MAX;

/// Reasons a decoded cart fails shape validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartShapeError {
    /// A line has an empty product id.
    #[error("cart line has a blank product id")]
    BlankProductId,
    /// A line has a quantity of zero.
    #[error("cart line {0} has zero quantity")]
    ZeroQuantity(ProductId),
    /// The same product appears on more than one line.
    #[error("product {0} appears on more than one cart line")]
    DuplicateProduct(ProductId),
}

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Catalog product this line refers to; unique within a cart.
    pub product_id: ProductId,
    /// Product name at the time it was added.
    pub name: String,
    /// Unit price at the time it was added.
    pub unit_price: Price,
    /// Image reference for display.
    pub image_ref: String,
    /// Number of units, always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// Price of the whole line (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Ordered collection of cart lines.
///
/// Order reflects insertion and is kept for display; totals do not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartState {
    lines: Vec<CartLine>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == product_id)
    }

    /// Add one unit of a product.
    ///
    /// Increments the existing line for `product_id` if there is one, otherwise
    /// appends a new line with quantity 1.
    ///
    /// Returns `false` when the line is already at [`MAX_QUANTITY`]; the cart
    /// is left unchanged in that case.
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        name: String,
        unit_price: Price,
        image_ref: String,
    ) -> bool {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            let Some(quantity) = line.quantity.checked_add(1) else {
                return false;
            };
            line.quantity = quantity;
            return true;
        }

        self.lines.push(CartLine {
            product_id,
            name,
            unit_price,
            image_ref,
            quantity: 1,
        });
        true
    }

    /// Remove the line for a product. Returns whether a line was removed.
    pub fn remove_line(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.product_id != product_id);
        self.lines.len() != before
    }

    /// Replace the quantity of a line.
    ///
    /// A quantity of zero or less removes the line. Absent products are left
    /// alone. Quantities above [`MAX_QUANTITY`] are clamped to it.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_line(product_id);
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(MAX_QUANTITY);
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
        {
            line.quantity = quantity;
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Check the invariants a decoded cart must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: blank product id, zero quantity,
    /// or a product repeated across lines.
    pub fn validate(&self) -> Result<(), CartShapeError> {
        for (i, line) in self.lines.iter().enumerate() {
            if line.product_id.is_blank() {
                return Err(CartShapeError::BlankProductId);
            }
            if line.quantity == 0 {
                return Err(CartShapeError::ZeroQuantity(line.product_id.clone()));
            }
            if self
                .lines
                .iter()
                .skip(i + 1)
                .any(|other| other.product_id == line.product_id)
            {
                return Err(CartShapeError::DuplicateProduct(line.product_id.clone()));
            }
        }
        Ok(())
    }
}

impl From<Vec<CartLine>> for CartState {
    fn from(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }
}
