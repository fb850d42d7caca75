//! Cart commands.

use techland_core::{Price, ProductId};

use super::Shell;

impl Shell {
    /// Add one unit of a product and print the cart.
    pub fn cart_add(&self, product_id: ProductId, name: String, price: Price, image: String) {
        self.tab.cart().add_line(product_id, name, price, image);
        self.cart_show();
    }

    /// Remove a product's line and print the cart.
    pub fn cart_remove(&self, product_id: &ProductId) {
        self.tab.cart().remove_line(product_id);
        self.cart_show();
    }

    /// Set a line's quantity and print the cart.
    pub fn cart_set(&self, product_id: &ProductId, quantity: i64) {
        self.tab.cart().set_quantity(product_id, quantity);
        self.cart_show();
    }

    /// Empty the cart.
    pub fn cart_clear(&self) {
        self.tab.cart().clear();
        self.cart_show();
    }

    /// Print every line, the item count, and the subtotal.
    #[allow(clippy::print_stdout)]
    pub fn cart_show(&self) {
        let cart = self.tab.cart();
        if cart.is_empty() {
            println!("Cart is empty");
            return;
        }

        for line in cart.lines() {
            println!(
                "{:<12} {:<24} x{:<4} {}",
                line.product_id,
                line.name,
                line.quantity,
                line.line_total().display_cop()
            );
        }
        println!("Items:    {}", cart.item_count());
        println!("Subtotal: {}", cart.subtotal().display_cop());
    }
}
