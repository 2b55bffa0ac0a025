//! Shared fixture model: a small web shop.
//!
//! ```text
//! Customer ──< Order ──< OrderLine >── Product
//!    │  │        │
//!    │  │        └── payment ─> Payment (polymorphic: CardPayment, WireTransfer)
//!    │  └── pets ──< Animal (Dog, Cat)
//!    └── address: Address { street, city, zip, country ─> Country }
//! ```

use super::{Attribute, BasicType, DomainModel, DomainModelBuilder, EmbeddableType, EntityType};

/// Builder pre-populated with the shop entities.
pub fn shop_model_builder() -> DomainModelBuilder {
    DomainModelBuilder::new()
        .embeddable(
            EmbeddableType::new("Address")
                .attribute(Attribute::basic("street", BasicType::String))
                .attribute(Attribute::basic("city", BasicType::String))
                .attribute(Attribute::basic("zip", BasicType::String))
                .attribute(Attribute::many_to_one("country", "Country")),
        )
        .entity(
            EntityType::new("Country")
                .attribute(Attribute::basic("code", BasicType::String))
                .attribute(Attribute::basic("name", BasicType::String)),
        )
        .entity(
            EntityType::new("Customer")
                .with_type_name("shop.Customer")
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("name", BasicType::String))
                .attribute(Attribute::basic("email", BasicType::String))
                .attribute(Attribute::embedded("address", "Address"))
                .attribute(Attribute::one_to_many("orders", "Order"))
                .attribute(Attribute::one_to_many("pets", "Animal"))
                .attribute(Attribute::any("preferredPayment", "Payment"))
                .attribute(Attribute::many_to_any("paymentMethods", "Payment")),
        )
        .entity(
            EntityType::new("Order")
                .with_type_name("shop.Order")
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("number", BasicType::String))
                .attribute(Attribute::basic("total", BasicType::Decimal))
                .attribute(Attribute::basic("placed", BasicType::Timestamp))
                .attribute(Attribute::basic("status", BasicType::String))
                .attribute(Attribute::many_to_one("customer", "Customer"))
                .attribute(Attribute::one_to_many("lines", "OrderLine"))
                .attribute(Attribute::embedded("shippingAddress", "Address"))
                .attribute(Attribute::one_to_one("payment", "Payment")),
        )
        .entity(
            EntityType::new("OrderLine")
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("quantity", BasicType::Integer))
                .attribute(Attribute::basic("price", BasicType::Decimal))
                .attribute(Attribute::many_to_one("order", "Order"))
                .attribute(Attribute::many_to_one("product", "Product")),
        )
        .entity(
            EntityType::new("Product")
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("sku", BasicType::String))
                .attribute(Attribute::basic("name", BasicType::String))
                .attribute(Attribute::basic("price", BasicType::Decimal))
                .attribute(Attribute::basic("active", BasicType::Boolean)),
        )
        .entity(
            EntityType::new("Payment")
                .polymorphic()
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("amount", BasicType::Decimal)),
        )
        .entity(
            EntityType::new("CardPayment")
                .extends("Payment")
                .attribute(Attribute::basic("cardNumber", BasicType::String)),
        )
        .entity(
            EntityType::new("WireTransfer")
                .extends("Payment")
                .attribute(Attribute::basic("iban", BasicType::String)),
        )
        .entity(
            EntityType::new("Animal")
                .attribute(Attribute::basic("id", BasicType::Long))
                .attribute(Attribute::basic("name", BasicType::String))
                .attribute(Attribute::many_to_one("owner", "Customer")),
        )
        .entity(
            EntityType::new("Dog")
                .extends("Animal")
                .attribute(Attribute::basic("breed", BasicType::String)),
        )
        .entity(
            EntityType::new("Cat")
                .extends("Animal")
                .attribute(Attribute::basic("lives", BasicType::Integer)),
        )
}

/// The shop fixture model with strict compliance off.
pub fn shop_model() -> DomainModel {
    build(shop_model_builder())
}

/// The shop fixture model with strict compliance on.
pub fn strict_shop_model() -> DomainModel {
    build(shop_model_builder().strict_jpa_compliance(true))
}

fn build(builder: DomainModelBuilder) -> DomainModel {
    match builder.build() {
        Ok(model) => model,
        Err(err) => unreachable!("shop fixture model is consistent: {err}"),
    }
}
